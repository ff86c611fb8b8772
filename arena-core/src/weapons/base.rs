//! Base weapons: Orbit, Bullet, Shockwave, Laser, Mines.
//!
//! Shield lives in [`super::shield`] since Fortress shares it.

use glam::Vec2;
use rand::Rng;
use std::collections::HashSet;
use std::f32::consts::{PI, TAU};

use super::ledger::HitLedger;
use super::{ProjectileView, TickContext, VisualKind, WeaponKind, WeaponOutput};
use crate::entities::TargetRef;
use crate::geometry::{angle_to, circles_overlap, distance, heading, point_segment_distance};

// ============================================================================
// Orbit
// ============================================================================

const ORBIT_BASE_RANGE: f32 = 70.0;
const ORBIT_RANGE_PER_LEVEL: f32 = 8.0;
const ORBIT_ORB_RADIUS: f32 = 12.0;
const ORBIT_SPIN: f32 = 3.0;
const ORBIT_DAMAGE: f32 = 10.0;

/// `1 + level` orbs circling the owner, damaging on contact.
#[derive(Debug, Clone, Default)]
pub struct OrbitState {
    phase: f32,
    ledger: HitLedger,
}

impl OrbitState {
    pub(super) fn update(&mut self, level: u8, ctx: &mut TickContext<'_>, out: &mut WeaponOutput) {
        let count = 1 + level as usize;
        let range = (ORBIT_BASE_RANGE + ORBIT_RANGE_PER_LEVEL * level as f32) * ctx.area();
        self.phase = (self.phase + ORBIT_SPIN * ctx.dt) % TAU;

        for i in 0..count {
            let a = self.phase + TAU * i as f32 / count as f32;
            let p = ctx.owner.pos + heading(a) * range;
            for t in ctx.targets() {
                if circles_overlap(p, ORBIT_ORB_RADIUS, t.pos, t.radius)
                    && self.ledger.try_hit(t.target, ctx.now)
                {
                    let hit = ctx.hit(t, ORBIT_DAMAGE, WeaponKind::Orbit, level);
                    out.hits.push(hit);
                }
            }
            out.projectiles.push(ProjectileView::circle(
                VisualKind::OrbitOrb,
                ctx.owner.id,
                p,
                ORBIT_ORB_RADIUS,
            ));
        }
        self.ledger.prune(ctx.now);
    }
}

// ============================================================================
// Bullet
// ============================================================================

const BULLET_COOLDOWN: f32 = 0.8;
const BULLET_RANGE: f32 = 500.0;
const BULLET_SPEED: f32 = 500.0;
const BULLET_TTL: f32 = 1.2;
const BULLET_RADIUS: f32 = 6.0;
const BULLET_DAMAGE: f32 = 15.0;

#[derive(Debug, Clone)]
struct Bullet {
    pos: Vec2,
    vel: Vec2,
    ttl: f32,
}

/// Fires at the `level` nearest targets. Each bullet expires on its first hit.
#[derive(Debug, Clone, Default)]
pub struct BulletState {
    cooldown: f32,
    bullets: Vec<Bullet>,
}

impl BulletState {
    pub(super) fn update(&mut self, level: u8, ctx: &mut TickContext<'_>, out: &mut WeaponOutput) {
        self.cooldown -= ctx.dt;
        if self.cooldown <= 0.0 {
            let aims = ctx.nearest(ctx.owner.pos, BULLET_RANGE * ctx.area(), level as usize);
            if !aims.is_empty() {
                for t in &aims {
                    let dir = heading(angle_to(ctx.owner.pos, t.pos));
                    self.bullets.push(Bullet {
                        pos: ctx.owner.pos,
                        vel: dir * BULLET_SPEED,
                        ttl: BULLET_TTL,
                    });
                }
                self.cooldown = ctx.cooldown(BULLET_COOLDOWN);
            }
        }

        let mut i = 0;
        while i < self.bullets.len() {
            let prev = self.bullets[i].pos;
            let b = &mut self.bullets[i];
            b.pos += b.vel * ctx.dt;
            b.ttl -= ctx.dt;
            let next = b.pos;

            let struck = ctx
                .targets()
                .filter(|t| point_segment_distance(t.pos, prev, next) <= BULLET_RADIUS + t.radius)
                .min_by(|a, b| distance(prev, a.pos).total_cmp(&distance(prev, b.pos)));
            if let Some(t) = struck {
                let hit = ctx.hit(t, BULLET_DAMAGE, WeaponKind::Bullet, level);
                out.hits.push(hit);
                self.bullets.swap_remove(i);
                continue;
            }
            if self.bullets[i].ttl <= 0.0 {
                self.bullets.swap_remove(i);
                continue;
            }
            out.projectiles.push(ProjectileView::circle(
                VisualKind::Bullet,
                ctx.owner.id,
                next,
                BULLET_RADIUS,
            ));
            i += 1;
        }
    }
}

// ============================================================================
// Shockwave
// ============================================================================

const SHOCKWAVE_PERIOD: f32 = 2.5;
const SHOCKWAVE_BASE_RADIUS: f32 = 150.0;
const SHOCKWAVE_RADIUS_PER_LEVEL: f32 = 20.0;
const SHOCKWAVE_SPEED: f32 = 300.0;
const SHOCKWAVE_BAND: f32 = 18.0;
const SHOCKWAVE_DAMAGE: f32 = 20.0;

#[derive(Debug, Clone)]
struct Wave {
    origin: Vec2,
    radius: f32,
    max_radius: f32,
    hit: HashSet<TargetRef>,
}

/// Expanding ring. Each wave hits a target at most once.
#[derive(Debug, Clone, Default)]
pub struct ShockwaveState {
    cooldown: f32,
    waves: Vec<Wave>,
    ledger: HitLedger,
}

impl ShockwaveState {
    pub(super) fn update(&mut self, level: u8, ctx: &mut TickContext<'_>, out: &mut WeaponOutput) {
        self.cooldown -= ctx.dt;
        if self.cooldown <= 0.0 {
            self.waves.push(Wave {
                origin: ctx.owner.pos,
                radius: 0.0,
                max_radius: (SHOCKWAVE_BASE_RADIUS + SHOCKWAVE_RADIUS_PER_LEVEL * level as f32)
                    * ctx.area(),
                hit: HashSet::new(),
            });
            self.cooldown = ctx.cooldown(SHOCKWAVE_PERIOD);
        }

        for wave in &mut self.waves {
            wave.radius += SHOCKWAVE_SPEED * ctx.dt;
            for t in ctx.targets() {
                let d = distance(wave.origin, t.pos);
                if (d - wave.radius).abs() > SHOCKWAVE_BAND + t.radius {
                    continue;
                }
                if wave.hit.insert(t.target) && self.ledger.try_hit(t.target, ctx.now) {
                    let hit = ctx.hit(t, SHOCKWAVE_DAMAGE, WeaponKind::Shockwave, level);
                    out.hits.push(hit);
                }
            }
        }
        self.waves.retain(|w| w.radius < w.max_radius);
        for w in &self.waves {
            out.projectiles.push(ProjectileView::circle(
                VisualKind::Shockwave,
                ctx.owner.id,
                w.origin,
                w.radius,
            ));
        }
        self.ledger.prune(ctx.now);
    }
}

// ============================================================================
// Laser
// ============================================================================

const LASER_COOLDOWN: f32 = 2.0;
const LASER_BASE_LENGTH: f32 = 300.0;
const LASER_LENGTH_PER_LEVEL: f32 = 40.0;
const LASER_WIDTH: f32 = 10.0;
const LASER_DAMAGE: f32 = 25.0;
const LASER_VISUAL_SECS: f32 = 0.3;

#[derive(Debug, Clone)]
struct Beam {
    origin: Vec2,
    angle: f32,
    length: f32,
    ttl: f32,
}

/// Instant beam along the owner's facing. Damage is resolved when fired;
/// the beam then lingers as a visual.
#[derive(Debug, Clone, Default)]
pub struct LaserState {
    cooldown: f32,
    beams: Vec<Beam>,
}

impl LaserState {
    pub(super) fn update(&mut self, level: u8, ctx: &mut TickContext<'_>, out: &mut WeaponOutput) {
        for b in &mut self.beams {
            b.ttl -= ctx.dt;
        }
        self.beams.retain(|b| b.ttl > 0.0);

        self.cooldown -= ctx.dt;
        if self.cooldown <= 0.0 {
            let beam = Beam {
                origin: ctx.owner.pos,
                angle: ctx.owner.angle,
                length: (LASER_BASE_LENGTH + LASER_LENGTH_PER_LEVEL * level as f32) * ctx.area(),
                ttl: LASER_VISUAL_SECS,
            };
            let end = beam.origin + heading(beam.angle) * beam.length;
            let mut struck: HashSet<TargetRef> = HashSet::new();
            for t in ctx.targets() {
                if point_segment_distance(t.pos, beam.origin, end) <= LASER_WIDTH / 2.0 + t.radius
                    && struck.insert(t.target)
                {
                    let hit = ctx.hit(t, LASER_DAMAGE, WeaponKind::Laser, level);
                    out.hits.push(hit);
                }
            }
            self.beams.push(beam);
            self.cooldown = ctx.cooldown(LASER_COOLDOWN);
        }

        for b in &self.beams {
            out.projectiles.push(ProjectileView::beam(
                VisualKind::Laser,
                ctx.owner.id,
                b.origin,
                b.angle,
                b.length,
                LASER_WIDTH,
            ));
        }
    }
}

// ============================================================================
// Mines
// ============================================================================

const MINE_DROP_INTERVAL: f32 = 1.5;
const MINE_BASE_MAX: usize = 3;
const MINE_TRIGGER_RADIUS: f32 = 14.0;
const MINE_BASE_BLAST: f32 = 60.0;
const MINE_BLAST_PER_LEVEL: f32 = 10.0;
const MINE_DAMAGE: f32 = 30.0;
const MINE_LIFETIME: f32 = 8.0;
const MINE_BLAST_VISUAL_SECS: f32 = 0.25;
const MINE_DROP_JITTER: f32 = 15.0;
const MINE_DROP_SPREAD: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum MinePhase {
    Armed,
    /// Already detonated; only the blast visual remains
    Exploding { ttl: f32, radius: f32 },
}

#[derive(Debug, Clone)]
pub(super) struct Mine {
    pub pos: Vec2,
    pub ttl: f32,
    pub phase: MinePhase,
}

/// Drop a trap behind the owner, jittered.
pub(super) fn drop_behind(ctx: &mut TickContext<'_>) -> Vec2 {
    let spread = ctx.rng.gen_range(-MINE_DROP_SPREAD..=MINE_DROP_SPREAD);
    let jitter = Vec2::new(
        ctx.rng.gen_range(-MINE_DROP_JITTER..=MINE_DROP_JITTER),
        ctx.rng.gen_range(-MINE_DROP_JITTER..=MINE_DROP_JITTER),
    );
    let back = ctx.owner.angle + PI + spread;
    ctx.owner.pos + heading(back) * (ctx.owner.radius + 10.0) + jitter
}

/// Damage every target within `radius` of `center`.
pub(super) fn blast(
    ctx: &mut TickContext<'_>,
    out: &mut WeaponOutput,
    center: Vec2,
    radius: f32,
    damage: f32,
    weapon: WeaponKind,
    level: u8,
) {
    for t in ctx.targets() {
        if circles_overlap(center, radius, t.pos, t.radius) {
            let hit = ctx.hit(t, damage, weapon, level);
            out.hits.push(hit);
        }
    }
}

/// Proximity mines: up to `3 + level` armed at once.
#[derive(Debug, Clone, Default)]
pub struct MinesState {
    cooldown: f32,
    mines: Vec<Mine>,
}

impl MinesState {
    fn armed(&self) -> usize {
        self.mines
            .iter()
            .filter(|m| m.phase == MinePhase::Armed)
            .count()
    }

    pub(super) fn update(&mut self, level: u8, ctx: &mut TickContext<'_>, out: &mut WeaponOutput) {
        self.cooldown -= ctx.dt;
        if self.cooldown <= 0.0 && self.armed() < MINE_BASE_MAX + level as usize {
            let pos = drop_behind(ctx);
            self.mines.push(Mine {
                pos,
                ttl: MINE_LIFETIME,
                phase: MinePhase::Armed,
            });
            self.cooldown = ctx.cooldown(MINE_DROP_INTERVAL);
        }

        let blast_radius = (MINE_BASE_BLAST + MINE_BLAST_PER_LEVEL * level as f32) * ctx.area();
        for mine in &mut self.mines {
            match mine.phase {
                MinePhase::Armed => {
                    mine.ttl -= ctx.dt;
                    let tripped = ctx
                        .targets()
                        .any(|t| circles_overlap(mine.pos, MINE_TRIGGER_RADIUS, t.pos, t.radius));
                    if tripped {
                        blast(ctx, out, mine.pos, blast_radius, MINE_DAMAGE, WeaponKind::Mines, level);
                        mine.phase = MinePhase::Exploding {
                            ttl: MINE_BLAST_VISUAL_SECS,
                            radius: blast_radius,
                        };
                    }
                }
                MinePhase::Exploding { ref mut ttl, .. } => *ttl -= ctx.dt,
            }
        }
        self.mines.retain(|m| match m.phase {
            MinePhase::Armed => m.ttl > 0.0,
            MinePhase::Exploding { ttl, .. } => ttl > 0.0,
        });

        for m in &self.mines {
            let view = match m.phase {
                MinePhase::Armed => {
                    ProjectileView::circle(VisualKind::Mine, ctx.owner.id, m.pos, MINE_TRIGGER_RADIUS)
                }
                MinePhase::Exploding { radius, .. } => {
                    ProjectileView::circle(VisualKind::Blast, ctx.owner.id, m.pos, radius)
                }
            };
            out.projectiles.push(view);
        }
    }
}

/// Shared by tests in sibling modules.
#[cfg(test)]
pub(super) fn targets_hit(out: &WeaponOutput) -> HashSet<TargetRef> {
    out.hits.iter().map(|h| h.target).collect()
}
