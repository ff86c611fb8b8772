//! Evolved weapons, each built from two maxed base weapons.

use glam::Vec2;
use std::collections::HashSet;
use std::f32::consts::TAU;

use super::base::{blast, drop_behind};
use super::ledger::HitLedger;
use super::shield::ShieldState;
use super::{ProjectileView, PullEvent, TickContext, VisualKind, WeaponKind, WeaponOutput};
use crate::entities::TargetRef;
use crate::geometry::{angle_to, circles_overlap, heading, point_segment_distance, turn_toward};

// ============================================================================
// Plasma Storm (Orbit + Shockwave)
// ============================================================================

const PLASMA_BASE_NODES: usize = 3;
const PLASMA_RANGE: f32 = 110.0;
const PLASMA_NODE_RADIUS: f32 = 14.0;
const PLASMA_SPIN: f32 = 2.4;
const PLASMA_CONTACT_DAMAGE: f32 = 18.0;
const PLASMA_PULSE_INTERVAL: f32 = 1.5;
const PLASMA_PULSE_RADIUS: f32 = 70.0;
const PLASMA_PULSE_DAMAGE: f32 = 22.0;

/// Orbiting nodes that also emit periodic pulses.
#[derive(Debug, Clone, Default)]
pub struct PlasmaStormState {
    phase: f32,
    pulse_cooldown: f32,
    contact: HitLedger,
    pulse: HitLedger,
}

impl PlasmaStormState {
    pub(super) fn update(&mut self, level: u8, ctx: &mut TickContext<'_>, out: &mut WeaponOutput) {
        let count = PLASMA_BASE_NODES + level as usize;
        let range = PLASMA_RANGE * ctx.area();
        self.phase = (self.phase + PLASMA_SPIN * ctx.dt) % TAU;

        self.pulse_cooldown -= ctx.dt;
        let pulsing = self.pulse_cooldown <= 0.0;
        if pulsing {
            self.pulse_cooldown = ctx.cooldown(PLASMA_PULSE_INTERVAL);
        }
        let pulse_radius = PLASMA_PULSE_RADIUS * ctx.area();

        for i in 0..count {
            let a = self.phase + TAU * i as f32 / count as f32;
            let node = ctx.owner.pos + heading(a) * range;
            for t in ctx.targets() {
                if circles_overlap(node, PLASMA_NODE_RADIUS, t.pos, t.radius)
                    && self.contact.try_hit(t.target, ctx.now)
                {
                    let hit = ctx.hit(t, PLASMA_CONTACT_DAMAGE, WeaponKind::PlasmaStorm, level);
                    out.hits.push(hit);
                }
                if pulsing
                    && circles_overlap(node, pulse_radius, t.pos, t.radius)
                    && self.pulse.try_hit(t.target, ctx.now)
                {
                    let hit = ctx.hit(t, PLASMA_PULSE_DAMAGE, WeaponKind::PlasmaStorm, level);
                    out.hits.push(hit);
                }
            }
            out.projectiles.push(ProjectileView::circle(
                VisualKind::PlasmaNode,
                ctx.owner.id,
                node,
                PLASMA_NODE_RADIUS,
            ));
            if pulsing {
                out.projectiles.push(ProjectileView::circle(
                    VisualKind::PlasmaPulse,
                    ctx.owner.id,
                    node,
                    pulse_radius,
                ));
            }
        }
        self.contact.prune(ctx.now);
        self.pulse.prune(ctx.now);
    }
}

// ============================================================================
// Railgun (Bullet + Laser)
// ============================================================================

const RAIL_COOLDOWN: f32 = 1.2;
const RAIL_RANGE: f32 = 700.0;
const RAIL_SPEED: f32 = 1100.0;
const RAIL_TURN_RATE: f32 = 6.0;
const RAIL_RADIUS: f32 = 8.0;
const RAIL_DAMAGE: f32 = 40.0;
const RAIL_TTL: f32 = 1.0;

#[derive(Debug, Clone)]
struct Bolt {
    pos: Vec2,
    angle: f32,
    ttl: f32,
    target: TargetRef,
    hit: HashSet<TargetRef>,
}

/// Fast homing bolt that pierces everything on its path.
#[derive(Debug, Clone, Default)]
pub struct RailgunState {
    cooldown: f32,
    bolts: Vec<Bolt>,
}

impl RailgunState {
    pub(super) fn update(&mut self, level: u8, ctx: &mut TickContext<'_>, out: &mut WeaponOutput) {
        self.cooldown -= ctx.dt;
        if self.cooldown <= 0.0 {
            if let Some(t) = ctx.nearest(ctx.owner.pos, RAIL_RANGE * ctx.area(), 1).first() {
                self.bolts.push(Bolt {
                    pos: ctx.owner.pos,
                    angle: angle_to(ctx.owner.pos, t.pos),
                    ttl: RAIL_TTL,
                    target: t.target,
                    hit: HashSet::new(),
                });
                self.cooldown = ctx.cooldown(RAIL_COOLDOWN);
            }
        }

        for bolt in &mut self.bolts {
            // After piercing its target the bolt homes on the nearest fresh one,
            // or flies straight when none is left
            if bolt.hit.contains(&bolt.target) {
                if let Some(next) = ctx
                    .targets()
                    .filter(|t| !bolt.hit.contains(&t.target))
                    .filter(|t| t.pos.distance_squared(bolt.pos) <= RAIL_RANGE * RAIL_RANGE)
                    .min_by(|a, b| {
                        a.pos
                            .distance_squared(bolt.pos)
                            .total_cmp(&b.pos.distance_squared(bolt.pos))
                    })
                {
                    bolt.target = next.target;
                }
            }
            if let Some(t) = ctx.find(bolt.target).filter(|t| !bolt.hit.contains(&t.target)) {
                let want = angle_to(bolt.pos, t.pos);
                bolt.angle = turn_toward(bolt.angle, want, RAIL_TURN_RATE * ctx.dt);
            }
            let prev = bolt.pos;
            bolt.pos += heading(bolt.angle) * RAIL_SPEED * ctx.dt;
            bolt.ttl -= ctx.dt;
            for t in ctx.targets() {
                if point_segment_distance(t.pos, prev, bolt.pos) <= RAIL_RADIUS + t.radius
                    && bolt.hit.insert(t.target)
                {
                    let hit = ctx.hit(t, RAIL_DAMAGE, WeaponKind::Railgun, level);
                    out.hits.push(hit);
                }
            }
        }
        self.bolts.retain(|b| b.ttl > 0.0);
        for b in &self.bolts {
            out.projectiles.push(ProjectileView {
                angle: Some(b.angle),
                ..ProjectileView::circle(VisualKind::RailBolt, ctx.owner.id, b.pos, RAIL_RADIUS)
            });
        }
    }
}

// ============================================================================
// Fortress (Mines + Shield)
// ============================================================================

const FORTRESS_BASE_MINES: usize = 4;
const FORTRESS_RING: f32 = 90.0;
const FORTRESS_SPIN: f32 = 1.5;
const FORTRESS_TRIGGER_RADIUS: f32 = 14.0;
const FORTRESS_BLAST: f32 = 55.0;
const FORTRESS_DAMAGE: f32 = 35.0;
const FORTRESS_REARM: f64 = 2.0;

/// Ring of re-arming mines plus a heavy shield.
#[derive(Debug, Clone)]
pub struct FortressState {
    phase: f32,
    rearm_at: Vec<f64>,
    pub shield: ShieldState,
}

impl FortressState {
    pub fn new(level: u8) -> Self {
        Self {
            phase: 0.0,
            rearm_at: Vec::new(),
            shield: ShieldState::fortress(level),
        }
    }

    pub(super) fn update(&mut self, level: u8, ctx: &mut TickContext<'_>, out: &mut WeaponOutput) {
        let count = FORTRESS_BASE_MINES + level as usize;
        self.rearm_at.resize(count, 0.0);
        self.phase = (self.phase + FORTRESS_SPIN * ctx.dt) % TAU;
        let ring = FORTRESS_RING * ctx.area();
        let blast_radius = FORTRESS_BLAST * ctx.area();

        for i in 0..count {
            let a = self.phase + TAU * i as f32 / count as f32;
            let p = ctx.owner.pos + heading(a) * ring;
            if ctx.now < self.rearm_at[i] {
                continue;
            }
            let tripped = ctx
                .targets()
                .any(|t| circles_overlap(p, FORTRESS_TRIGGER_RADIUS, t.pos, t.radius));
            if tripped {
                blast(ctx, out, p, blast_radius, FORTRESS_DAMAGE, WeaponKind::Fortress, level);
                self.rearm_at[i] = ctx.now + FORTRESS_REARM;
                out.projectiles
                    .push(ProjectileView::circle(VisualKind::Blast, ctx.owner.id, p, blast_radius));
            } else {
                out.projectiles.push(ProjectileView::circle(
                    VisualKind::FortressMine,
                    ctx.owner.id,
                    p,
                    FORTRESS_TRIGGER_RADIUS,
                ));
            }
        }
        self.shield.update(ctx, out);
    }
}

// ============================================================================
// Meteor Shower (Bullet + Shockwave)
// ============================================================================

const METEOR_COOLDOWN: f32 = 1.4;
const METEOR_RANGE: f32 = 600.0;
const METEOR_SPEED: f32 = 350.0;
const METEOR_TURN_RATE: f32 = 4.0;
const METEOR_RADIUS: f32 = 10.0;
const METEOR_BLAST: f32 = 80.0;
const METEOR_DAMAGE: f32 = 30.0;
const METEOR_TTL: f32 = 2.0;
const METEOR_BLAST_VISUAL_SECS: f32 = 0.3;

#[derive(Debug, Clone)]
struct Meteor {
    pos: Vec2,
    angle: f32,
    ttl: f32,
    target: TargetRef,
}

/// Homing meteors at distinct targets, exploding on impact.
#[derive(Debug, Clone, Default)]
pub struct MeteorShowerState {
    cooldown: f32,
    meteors: Vec<Meteor>,
    blasts: Vec<(Vec2, f32)>,
}

impl MeteorShowerState {
    pub(super) fn update(&mut self, level: u8, ctx: &mut TickContext<'_>, out: &mut WeaponOutput) {
        self.cooldown -= ctx.dt;
        if self.cooldown <= 0.0 {
            let aims = ctx.nearest(ctx.owner.pos, METEOR_RANGE * ctx.area(), level as usize + 1);
            if !aims.is_empty() {
                for t in aims {
                    self.meteors.push(Meteor {
                        pos: ctx.owner.pos,
                        angle: angle_to(ctx.owner.pos, t.pos),
                        ttl: METEOR_TTL,
                        target: t.target,
                    });
                }
                self.cooldown = ctx.cooldown(METEOR_COOLDOWN);
            }
        }

        for b in &mut self.blasts {
            b.1 -= ctx.dt;
        }
        self.blasts.retain(|b| b.1 > 0.0);

        let blast_radius = METEOR_BLAST * ctx.area();
        let mut i = 0;
        while i < self.meteors.len() {
            let m = &mut self.meteors[i];
            if let Some(t) = ctx.find(m.target) {
                let want = angle_to(m.pos, t.pos);
                m.angle = turn_toward(m.angle, want, METEOR_TURN_RATE * ctx.dt);
            }
            m.pos += heading(m.angle) * METEOR_SPEED * ctx.dt;
            m.ttl -= ctx.dt;
            let (pos, angle, ttl) = (m.pos, m.angle, m.ttl);

            let impact = ctx
                .targets()
                .any(|t| circles_overlap(pos, METEOR_RADIUS, t.pos, t.radius));
            if impact {
                blast(ctx, out, pos, blast_radius, METEOR_DAMAGE, WeaponKind::MeteorShower, level);
                self.blasts.push((pos, METEOR_BLAST_VISUAL_SECS));
                self.meteors.swap_remove(i);
                continue;
            }
            if ttl <= 0.0 {
                self.meteors.swap_remove(i);
                continue;
            }
            out.projectiles.push(ProjectileView {
                angle: Some(angle),
                ..ProjectileView::circle(VisualKind::Meteor, ctx.owner.id, pos, METEOR_RADIUS)
            });
            i += 1;
        }
        for (pos, _) in &self.blasts {
            out.projectiles
                .push(ProjectileView::circle(VisualKind::Blast, ctx.owner.id, *pos, blast_radius));
        }
    }
}

// ============================================================================
// Death Ray (Laser + Orbit)
// ============================================================================

const DEATH_RAY_BASE_BEAMS: usize = 2;
const DEATH_RAY_LENGTH: f32 = 220.0;
const DEATH_RAY_WIDTH: f32 = 12.0;
const DEATH_RAY_SPIN: f32 = 2.0;
const DEATH_RAY_DAMAGE: f32 = 12.0;
const DEATH_RAY_HIT_WINDOW: f64 = 0.3;

/// Rotating beams sweeping around the owner.
#[derive(Debug, Clone)]
pub struct DeathRayState {
    phase: f32,
    ledger: HitLedger,
}

impl Default for DeathRayState {
    fn default() -> Self {
        Self {
            phase: 0.0,
            ledger: HitLedger::new(DEATH_RAY_HIT_WINDOW),
        }
    }
}

impl DeathRayState {
    pub(super) fn update(&mut self, level: u8, ctx: &mut TickContext<'_>, out: &mut WeaponOutput) {
        let count = DEATH_RAY_BASE_BEAMS + level as usize;
        let length = DEATH_RAY_LENGTH * ctx.area();
        self.phase = (self.phase + DEATH_RAY_SPIN * ctx.dt) % TAU;
        let origin = ctx.owner.pos;

        for i in 0..count {
            let a = self.phase + TAU * i as f32 / count as f32;
            let end = origin + heading(a) * length;
            for t in ctx.targets() {
                if point_segment_distance(t.pos, origin, end) <= DEATH_RAY_WIDTH / 2.0 + t.radius
                    && self.ledger.try_hit(t.target, ctx.now)
                {
                    let hit = ctx.hit(t, DEATH_RAY_DAMAGE, WeaponKind::DeathRay, level);
                    out.hits.push(hit);
                }
            }
            out.projectiles.push(ProjectileView::beam(
                VisualKind::DeathBeam,
                ctx.owner.id,
                origin,
                a,
                length,
                DEATH_RAY_WIDTH,
            ));
        }
        self.ledger.prune(ctx.now);
    }
}

// ============================================================================
// Void Traps (Mines + Shockwave)
// ============================================================================

const VOID_DROP_INTERVAL: f32 = 1.8;
const VOID_BASE_MAX: usize = 3;
const VOID_PULL_RADIUS: f32 = 120.0;
const VOID_PULL_SECS: f32 = 0.8;
const VOID_PULL_SPEED: f32 = 160.0;
const VOID_BLAST: f32 = 90.0;
const VOID_DAMAGE: f32 = 40.0;
const VOID_LIFETIME: f32 = 10.0;
const VOID_TRAP_RADIUS: f32 = 12.0;
const VOID_BLAST_VISUAL_SECS: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
enum TrapPhase {
    Armed,
    Pulling { remaining: f32 },
    Exploding { ttl: f32 },
}

#[derive(Debug, Clone)]
struct Trap {
    pos: Vec2,
    ttl: f32,
    phase: TrapPhase,
}

/// Traps that drag nearby targets in, then detonate.
#[derive(Debug, Clone, Default)]
pub struct VoidTrapsState {
    cooldown: f32,
    traps: Vec<Trap>,
}

impl VoidTrapsState {
    fn live(&self) -> usize {
        self.traps
            .iter()
            .filter(|t| !matches!(t.phase, TrapPhase::Exploding { .. }))
            .count()
    }

    pub(super) fn update(&mut self, level: u8, ctx: &mut TickContext<'_>, out: &mut WeaponOutput) {
        self.cooldown -= ctx.dt;
        if self.cooldown <= 0.0 && self.live() < VOID_BASE_MAX + level as usize {
            let pos = drop_behind(ctx);
            self.traps.push(Trap {
                pos,
                ttl: VOID_LIFETIME,
                phase: TrapPhase::Armed,
            });
            self.cooldown = ctx.cooldown(VOID_DROP_INTERVAL);
        }

        let pull_radius = VOID_PULL_RADIUS * ctx.area();
        let blast_radius = VOID_BLAST * ctx.area();
        for trap in &mut self.traps {
            trap.phase = match trap.phase {
                TrapPhase::Armed => {
                    trap.ttl -= ctx.dt;
                    let near = ctx
                        .targets()
                        .any(|t| circles_overlap(trap.pos, pull_radius, t.pos, t.radius));
                    if near {
                        TrapPhase::Pulling {
                            remaining: VOID_PULL_SECS,
                        }
                    } else {
                        TrapPhase::Armed
                    }
                }
                TrapPhase::Pulling { remaining } => {
                    for t in ctx.targets() {
                        if circles_overlap(trap.pos, pull_radius, t.pos, t.radius) {
                            out.pulls.push(PullEvent {
                                target: t.target,
                                toward: trap.pos,
                                speed: VOID_PULL_SPEED,
                            });
                        }
                    }
                    let remaining = remaining - ctx.dt;
                    if remaining <= 0.0 {
                        blast(ctx, out, trap.pos, blast_radius, VOID_DAMAGE, WeaponKind::VoidTraps, level);
                        TrapPhase::Exploding {
                            ttl: VOID_BLAST_VISUAL_SECS,
                        }
                    } else {
                        TrapPhase::Pulling { remaining }
                    }
                }
                TrapPhase::Exploding { ttl } => TrapPhase::Exploding { ttl: ttl - ctx.dt },
            };
        }
        self.traps.retain(|t| match t.phase {
            TrapPhase::Armed => t.ttl > 0.0,
            TrapPhase::Pulling { .. } => true,
            TrapPhase::Exploding { ttl } => ttl > 0.0,
        });

        for t in &self.traps {
            let (kind, r) = match t.phase {
                TrapPhase::Armed => (VisualKind::VoidTrap, VOID_TRAP_RADIUS),
                TrapPhase::Pulling { .. } => (VisualKind::VoidTrap, pull_radius),
                TrapPhase::Exploding { .. } => (VisualKind::Blast, blast_radius),
            };
            out.projectiles
                .push(ProjectileView::circle(kind, ctx.owner.id, t.pos, r));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::base::targets_hit;
    use super::super::test_support::*;
    use super::super::Behavior;
    use super::*;
    use crate::entities::MobId;

    const DT: f32 = 1.0 / 30.0;

    #[test]
    fn test_plasma_storm_node_count() {
        let owner = owner_at(Vec2::new(1000.0, 1000.0));
        let mut b = Behavior::new(WeaponKind::PlasmaStorm, 2);
        let out = run(&mut b, 2, &owner, &[], 1, DT);
        let nodes = out
            .projectiles
            .iter()
            .filter(|p| p.kind == VisualKind::PlasmaNode)
            .count();
        assert_eq!(nodes, 5);
    }

    #[test]
    fn test_railgun_pierces_line() {
        let owner = owner_at(Vec2::new(1000.0, 1000.0));
        let mobs: Vec<_> = (0..3)
            .map(|i| mob_at(i, Vec2::new(1100.0 + 60.0 * i as f32, 1000.0)))
            .collect();
        let mut b = Behavior::new(WeaponKind::Railgun, 1);
        let out = run(&mut b, 1, &owner, &mobs, 10, DT);
        let hit = targets_hit(&out);
        assert_eq!(hit.len(), 3);
        // Pierce hits each target once per bolt
        assert_eq!(out.hits.len(), 3);
    }

    #[test]
    fn test_railgun_flies_straight_after_last_target() {
        let owner = owner_at(Vec2::new(1000.0, 1000.0));
        let mob = mob_at(1, Vec2::new(1100.0, 1000.0));
        let mut b = Behavior::new(WeaponKind::Railgun, 1);
        let out = run(&mut b, 1, &owner, &[mob], 6, DT);
        assert_eq!(out.hits.len(), 1);
        match &b {
            Behavior::Railgun(s) => {
                assert_eq!(s.bolts.len(), 1);
                // No turning back toward the pierced mob
                assert!(s.bolts[0].angle.abs() < 1e-4);
                assert!(s.bolts[0].pos.x > 1100.0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_fortress_ring_rearms() {
        let owner = owner_at(Vec2::new(1000.0, 1000.0));
        // Sits on the ring; the spinning mines sweep across it
        let mob = mob_at(1, Vec2::new(1090.0, 1000.0));
        let mut b = Behavior::new(WeaponKind::Fortress, 1);
        let out = run(&mut b, 1, &owner, &[mob], 30, DT);
        assert!(!out.hits.is_empty());
        assert!(out.hits.iter().all(|h| h.weapon == WeaponKind::Fortress));
    }

    #[test]
    fn test_meteor_targets_distinct() {
        let owner = owner_at(Vec2::new(1000.0, 1000.0));
        let mobs = [
            mob_at(1, Vec2::new(1200.0, 1000.0)),
            mob_at(2, Vec2::new(1000.0, 1200.0)),
        ];
        let mut b = Behavior::new(WeaponKind::MeteorShower, 1);
        let _ = run(&mut b, 1, &owner, &mobs, 1, DT);
        match &b {
            Behavior::MeteorShower(s) => {
                let targets: HashSet<_> = s.meteors.iter().map(|m| m.target).collect();
                assert_eq!(targets.len(), 2);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_death_ray_window() {
        let owner = owner_at(Vec2::new(1000.0, 1000.0));
        let mob = mob_at(1, Vec2::new(1100.0, 1000.0));
        let mut b = Behavior::new(WeaponKind::DeathRay, 5);
        // 7 beams at 2 rad/s; within 0.2s only the first contact counts
        let out = run(&mut b, 5, &owner, &[mob], 6, DT);
        assert_eq!(out.hits.len(), 1);
    }

    #[test]
    fn test_void_trap_pulls_then_detonates() {
        let owner = owner_at(Vec2::new(1000.0, 1000.0));
        let mut b = Behavior::new(WeaponKind::VoidTraps, 1);
        let _ = run(&mut b, 1, &owner, &[], 1, DT);
        let pos = match &b {
            Behavior::VoidTraps(s) => s.traps[0].pos,
            _ => unreachable!(),
        };
        let mob = mob_at(4, pos + Vec2::new(60.0, 0.0));
        let out = run(&mut b, 1, &owner, &[mob], 30, DT);
        assert!(out.pulls.iter().all(|p| p.toward == pos));
        assert!(!out.pulls.is_empty());
        let blasts = out
            .hits
            .iter()
            .filter(|h| h.target == TargetRef::Mob(MobId(4)))
            .count();
        assert_eq!(blasts, 1);
    }
}
