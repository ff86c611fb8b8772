//! Weapon engine: per-player behaviour state for every owned weapon.
//!
//! ```text
//! Room tick
//!   └→ WeaponEngine::update(owner, weapons, nearby mobs/players)
//!        └→ one Behavior per owned WeaponKind (closed enum, matched exhaustively)
//!        └→ WeaponOutput { hits, pulls, projectiles }
//!   └→ Room applies hits centrally: shields → armor rounding → hp
//! ```
//!
//! The engine never touches target hp. Damage is computed as an unrounded
//! float here and rounded once on the receiving end (see [`mitigate`]).

use glam::Vec2;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{
    CHARACTER_LEVEL_DAMAGE_STEP, CHARACTER_LEVEL_RATE_STEP, WEAPON_LEVEL_DAMAGE_STEP,
};
use crate::entities::{PlayerId, TargetRef};
use crate::geometry::distance_sq;
use crate::passives::PassiveStats;

pub mod base;
pub mod evolved;
pub mod ledger;
pub mod shield;

use base::{BulletState, LaserState, MinesState, OrbitState, ShockwaveState};
use evolved::{
    DeathRayState, FortressState, MeteorShowerState, PlasmaStormState, RailgunState,
    VoidTrapsState,
};
use shield::ShieldState;

// ============================================================================
// Weapon kinds and instances
// ============================================================================

/// Highest level for every weapon, base or evolved
pub const MAX_WEAPON_LEVEL: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WeaponKind {
    Orbit,
    Bullet,
    Shockwave,
    Laser,
    Mines,
    Shield,
    PlasmaStorm,
    Railgun,
    Fortress,
    MeteorShower,
    DeathRay,
    VoidTraps,
}

impl WeaponKind {
    pub const BASE: [WeaponKind; 6] = [
        WeaponKind::Orbit,
        WeaponKind::Bullet,
        WeaponKind::Shockwave,
        WeaponKind::Laser,
        WeaponKind::Mines,
        WeaponKind::Shield,
    ];

    pub const EVOLVED: [WeaponKind; 6] = [
        WeaponKind::PlasmaStorm,
        WeaponKind::Railgun,
        WeaponKind::Fortress,
        WeaponKind::MeteorShower,
        WeaponKind::DeathRay,
        WeaponKind::VoidTraps,
    ];

    pub fn is_evolved(&self) -> bool {
        self.recipe().is_some()
    }

    pub fn max_level(&self) -> u8 {
        MAX_WEAPON_LEVEL
    }

    /// The two base weapons an evolved weapon consumes.
    pub fn recipe(&self) -> Option<[WeaponKind; 2]> {
        use WeaponKind::*;
        match self {
            PlasmaStorm => Some([Orbit, Shockwave]),
            Railgun => Some([Bullet, Laser]),
            Fortress => Some([Mines, Shield]),
            MeteorShower => Some([Bullet, Shockwave]),
            DeathRay => Some([Laser, Orbit]),
            VoidTraps => Some([Mines, Shockwave]),
            Orbit | Bullet | Shockwave | Laser | Mines | Shield => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Orbit => "Orbit",
            Self::Bullet => "Bullet",
            Self::Shockwave => "Shockwave",
            Self::Laser => "Laser",
            Self::Mines => "Mines",
            Self::Shield => "Shield",
            Self::PlasmaStorm => "Plasma Storm",
            Self::Railgun => "Railgun",
            Self::Fortress => "Fortress",
            Self::MeteorShower => "Meteor Shower",
            Self::DeathRay => "Death Ray",
            Self::VoidTraps => "Void Traps",
        }
    }

    /// Parse a wire key (`"orbit"`, `"meteorShower"`, ...). Unknown keys are `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(key.to_string())).ok()
    }
}

/// One owned weapon. A player holds at most one instance per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponInstance {
    pub kind: WeaponKind,
    pub level: u8,
}

impl WeaponInstance {
    pub fn new(kind: WeaponKind) -> Self {
        Self { kind, level: 1 }
    }

    pub fn is_maxed(&self) -> bool {
        self.level >= self.kind.max_level()
    }

    pub fn evolved(&self) -> bool {
        self.kind.is_evolved()
    }
}

// ============================================================================
// Inputs and outputs
// ============================================================================

/// Snapshot of the weapon owner for one update.
#[derive(Debug, Clone, Copy)]
pub struct Owner {
    pub id: PlayerId,
    pub pos: Vec2,
    pub angle: f32,
    pub radius: f32,
    pub level: u32,
    pub passives: PassiveStats,
}

/// A damageable entity near the owner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub target: TargetRef,
    pub pos: Vec2,
    pub radius: f32,
}

/// Damage produced by a weapon, applied by the room in the same tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitEvent {
    pub target: TargetRef,
    pub damage: f32,
    pub attacker: PlayerId,
    pub pos: Vec2,
    pub weapon: WeaponKind,
    pub crit: bool,
}

/// Displacement request (void traps drag targets toward their centre).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PullEvent {
    pub target: TargetRef,
    pub toward: Vec2,
    pub speed: f32,
}

/// What a projectile descriptor draws as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisualKind {
    OrbitOrb,
    Bullet,
    Shockwave,
    Laser,
    Mine,
    Blast,
    Shield,
    PlasmaNode,
    PlasmaPulse,
    RailBolt,
    FortressMine,
    Meteor,
    DeathBeam,
    VoidTrap,
}

/// Render-only descriptor, rebuilt every tick and never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileView {
    pub kind: VisualKind,
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
    pub r: f32,
    pub angle: Option<f32>,
    pub len: Option<f32>,
}

impl ProjectileView {
    pub fn circle(kind: VisualKind, owner: PlayerId, pos: Vec2, r: f32) -> Self {
        Self {
            kind,
            owner,
            x: pos.x,
            y: pos.y,
            r,
            angle: None,
            len: None,
        }
    }

    pub fn beam(kind: VisualKind, owner: PlayerId, origin: Vec2, angle: f32, len: f32, width: f32) -> Self {
        Self {
            kind,
            owner,
            x: origin.x,
            y: origin.y,
            r: width,
            angle: Some(angle),
            len: Some(len),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WeaponOutput {
    pub hits: Vec<HitEvent>,
    pub pulls: Vec<PullEvent>,
    pub projectiles: Vec<ProjectileView>,
}

/// Everything a behaviour sees during one update.
pub struct TickContext<'a> {
    pub dt: f32,
    pub now: f64,
    pub owner: &'a Owner,
    pub mobs: &'a [Target],
    pub players: &'a [Target],
    pub rng: &'a mut dyn RngCore,
}

impl<'a> TickContext<'a> {
    /// Mobs first, then players. Does not borrow the context, so hits can be
    /// rolled while iterating.
    pub fn targets(&self) -> impl Iterator<Item = &'a Target> + 'a {
        let (mobs, players) = (self.mobs, self.players);
        mobs.iter().chain(players.iter())
    }

    pub fn find(&self, target: TargetRef) -> Option<&'a Target> {
        self.targets().find(|t| t.target == target)
    }

    /// Up to `n` targets within `range` of `from`, nearest first.
    pub fn nearest(&self, from: Vec2, range: f32, n: usize) -> Vec<Target> {
        let range_sq = range * range;
        let mut found: Vec<(f32, Target)> = self
            .targets()
            .map(|t| (distance_sq(from, t.pos), *t))
            .filter(|(d, _)| *d <= range_sq)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found.into_iter().take(n).map(|(_, t)| t).collect()
    }

    /// Roll damage for a hit and wrap it in an event.
    pub fn hit(&mut self, target: &Target, base: f32, weapon: WeaponKind, level: u8) -> HitEvent {
        let (damage, crit) = roll_damage(base, level, self.owner, &mut *self.rng);
        HitEvent {
            target: target.target,
            damage,
            attacker: self.owner.id,
            pos: target.pos,
            weapon,
            crit,
        }
    }

    /// Cooldown after Haste and character-level scaling.
    pub fn cooldown(&self, base_secs: f32) -> f32 {
        scaled_cooldown(base_secs, self.owner)
    }

    pub fn area(&self) -> f32 {
        self.owner.passives.area_mult
    }
}

// ============================================================================
// Damage pipeline
// ============================================================================

/// `base × weapon-level factor × character-level factor × might`, then × crit.
///
/// The result stays unrounded; rounding happens once in [`mitigate`].
pub fn roll_damage(base: f32, weapon_level: u8, owner: &Owner, rng: &mut dyn RngCore) -> (f32, bool) {
    let mut damage = base * (1.0 + weapon_level.saturating_sub(1) as f32 * WEAPON_LEVEL_DAMAGE_STEP);
    damage *= 1.0 + owner.level.saturating_sub(1) as f32 * CHARACTER_LEVEL_DAMAGE_STEP;
    damage *= owner.passives.damage_mult;
    let crit = owner.passives.crit_chance > 0.0 && rng.gen::<f32>() < owner.passives.crit_chance;
    if crit {
        damage *= owner.passives.crit_mult;
    }
    (damage, crit)
}

/// Receiving-end rounding: `max(1, round(damage × (1 − armor)))`.
/// Non-positive or non-finite damage deals nothing.
pub fn mitigate(damage: f32, armor_reduction: f32) -> i32 {
    if !damage.is_finite() || damage <= 0.0 {
        return 0;
    }
    let reduced = damage * (1.0 - armor_reduction.clamp(0.0, 1.0));
    (reduced.round() as i32).max(1)
}

pub fn scaled_cooldown(base_secs: f32, owner: &Owner) -> f32 {
    let level_factor = 1.0 + owner.level.saturating_sub(1) as f32 * CHARACTER_LEVEL_RATE_STEP;
    base_secs * owner.passives.cooldown_mult / level_factor
}

// ============================================================================
// Engine
// ============================================================================

/// Behaviour state for one owned weapon.
#[derive(Debug, Clone)]
pub enum Behavior {
    Orbit(OrbitState),
    Bullet(BulletState),
    Shockwave(ShockwaveState),
    Laser(LaserState),
    Mines(MinesState),
    Shield(ShieldState),
    PlasmaStorm(PlasmaStormState),
    Railgun(RailgunState),
    Fortress(FortressState),
    MeteorShower(MeteorShowerState),
    DeathRay(DeathRayState),
    VoidTraps(VoidTrapsState),
}

impl Behavior {
    pub fn new(kind: WeaponKind, level: u8) -> Self {
        match kind {
            WeaponKind::Orbit => Self::Orbit(OrbitState::default()),
            WeaponKind::Bullet => Self::Bullet(BulletState::default()),
            WeaponKind::Shockwave => Self::Shockwave(ShockwaveState::default()),
            WeaponKind::Laser => Self::Laser(LaserState::default()),
            WeaponKind::Mines => Self::Mines(MinesState::default()),
            WeaponKind::Shield => Self::Shield(ShieldState::basic(level)),
            WeaponKind::PlasmaStorm => Self::PlasmaStorm(PlasmaStormState::default()),
            WeaponKind::Railgun => Self::Railgun(RailgunState::default()),
            WeaponKind::Fortress => Self::Fortress(FortressState::new(level)),
            WeaponKind::MeteorShower => Self::MeteorShower(MeteorShowerState::default()),
            WeaponKind::DeathRay => Self::DeathRay(DeathRayState::default()),
            WeaponKind::VoidTraps => Self::VoidTraps(VoidTrapsState::default()),
        }
    }

    fn set_level(&mut self, level: u8) {
        match self {
            Self::Shield(shield) => shield.set_capacity(ShieldState::basic_capacity(level)),
            Self::Fortress(fortress) => fortress
                .shield
                .set_capacity(ShieldState::fortress_capacity(level)),
            _ => {}
        }
    }

    fn update(&mut self, level: u8, ctx: &mut TickContext<'_>, out: &mut WeaponOutput) {
        match self {
            Self::Orbit(s) => s.update(level, ctx, out),
            Self::Bullet(s) => s.update(level, ctx, out),
            Self::Shockwave(s) => s.update(level, ctx, out),
            Self::Laser(s) => s.update(level, ctx, out),
            Self::Mines(s) => s.update(level, ctx, out),
            Self::Shield(s) => s.update(ctx, out),
            Self::PlasmaStorm(s) => s.update(level, ctx, out),
            Self::Railgun(s) => s.update(level, ctx, out),
            Self::Fortress(s) => s.update(level, ctx, out),
            Self::MeteorShower(s) => s.update(level, ctx, out),
            Self::DeathRay(s) => s.update(level, ctx, out),
            Self::VoidTraps(s) => s.update(level, ctx, out),
        }
    }
}

/// All behaviour state for one player. Owned by the room, one per player.
#[derive(Debug, Clone, Default)]
pub struct WeaponEngine {
    behaviors: BTreeMap<WeaponKind, (u8, Behavior)>,
}

impl WeaponEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match behaviour state to the owned weapon list: create new kinds, drop
    /// removed ones, propagate level changes.
    pub fn sync(&mut self, weapons: &[WeaponInstance]) {
        self.behaviors
            .retain(|kind, _| weapons.iter().any(|w| w.kind == *kind));
        for w in weapons {
            match self.behaviors.get_mut(&w.kind) {
                Some((level, behavior)) => {
                    if *level != w.level {
                        *level = w.level;
                        behavior.set_level(w.level);
                    }
                }
                None => {
                    self.behaviors
                        .insert(w.kind, (w.level, Behavior::new(w.kind, w.level)));
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.behaviors.clear();
    }

    pub fn has(&self, kind: WeaponKind) -> bool {
        self.behaviors.contains_key(&kind)
    }

    /// Advance every owned behaviour one tick.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        dt: f32,
        owner: &Owner,
        weapons: &[WeaponInstance],
        mobs: &[Target],
        players: &[Target],
        now: f64,
        rng: &mut dyn RngCore,
    ) -> WeaponOutput {
        self.sync(weapons);
        let mut out = WeaponOutput::default();
        let mut ctx = TickContext {
            dt,
            now,
            owner,
            mobs,
            players,
            rng,
        };
        for (level, behavior) in self.behaviors.values_mut() {
            behavior.update(*level, &mut ctx, &mut out);
        }
        out.hits.retain(|h| h.damage.is_finite() && h.damage > 0.0);
        out
    }

    /// Route incoming damage through shields: evolved shield first, then the
    /// base shield. Returns what is left for hp.
    pub fn absorb(&mut self, damage: f32, now: f64) -> f32 {
        let mut remaining = damage;
        if let Some((_, Behavior::Fortress(fortress))) = self.behaviors.get_mut(&WeaponKind::Fortress) {
            remaining = fortress.shield.absorb(remaining, now);
        }
        if remaining > 0.0 {
            if let Some((_, Behavior::Shield(shield))) = self.behaviors.get_mut(&WeaponKind::Shield) {
                remaining = shield.absorb(remaining, now);
            }
        }
        remaining
    }

    /// Base shield state, if owned.
    pub fn shield(&self) -> Option<&ShieldState> {
        match self.behaviors.get(&WeaponKind::Shield) {
            Some((_, Behavior::Shield(s))) => Some(s),
            _ => None,
        }
    }

    /// Fortress shield state, if owned.
    pub fn fortress_shield(&self) -> Option<&ShieldState> {
        match self.behaviors.get(&WeaponKind::Fortress) {
            Some((_, Behavior::Fortress(f))) => Some(&f.shield),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::entities::MobId;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    pub fn owner_at(pos: Vec2) -> Owner {
        Owner {
            id: PlayerId(1),
            pos,
            angle: 0.0,
            radius: 20.0,
            level: 1,
            passives: PassiveStats::default(),
        }
    }

    pub fn mob_at(id: u32, pos: Vec2) -> Target {
        Target {
            target: TargetRef::Mob(MobId(id)),
            pos,
            radius: 12.0,
        }
    }

    pub fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(7)
    }

    /// Run a behaviour for `steps` ticks of `dt`, collecting all output.
    pub fn run(
        behavior: &mut Behavior,
        level: u8,
        owner: &Owner,
        mobs: &[Target],
        steps: usize,
        dt: f32,
    ) -> WeaponOutput {
        let mut rng = rng();
        let mut all = WeaponOutput::default();
        for i in 0..steps {
            let mut ctx = TickContext {
                dt,
                now: (i + 1) as f64 * dt as f64,
                owner,
                mobs,
                players: &[],
                rng: &mut rng,
            };
            behavior.update(level, &mut ctx, &mut all);
        }
        all
    }
}
