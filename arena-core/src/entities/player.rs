//! Player record: stats, progression state, loadout.

use glam::Vec2;
use std::collections::BTreeMap;

use super::PlayerId;
use crate::constants::{
    MAX_CHARACTER_LEVEL, PLAYER_BASE_HP, PLAYER_BASE_RADIUS, PLAYER_BASE_SPEED, PLAYER_MAX_RADIUS,
    PLAYER_RADIUS_PER_LEVEL, SPAWN_IMMUNITY_SECS,
};
use crate::passives::{PassiveKind, PassiveStats};
use crate::progression::LevelUpOption;
use crate::weapons::{WeaponInstance, WeaponKind};

/// XP required to go from `level` to `level + 1`: `round(10 × level^1.4)`.
pub fn xp_to_next(level: u32) -> u32 {
    (10.0 * (level.max(1) as f64).powf(1.4)).round() as u32
}

pub const DEFAULT_COSMETIC: &str = "default";

/// Default starting loadout
pub const STARTING_WEAPONS: [WeaponKind; 2] = [WeaponKind::Orbit, WeaponKind::Bullet];

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub pos: Vec2,
    pub angle: f32,
    pub moving: bool,

    pub hp: i32,
    pub max_hp: i32,
    pub level: u32,
    /// Progress toward the next level
    pub xp: u32,
    /// Lifetime XP this life, used for the death drop
    pub total_xp: u32,
    pub score: u32,
    pub kills: u32,
    pub mob_kills: u32,

    pub weapons: Vec<WeaponInstance>,
    pub passives: BTreeMap<PassiveKind, u8>,

    pub alive: bool,
    pub immune_until: f64,
    pub spawned_at: f64,
    pub last_attacker: Option<PlayerId>,

    /// Options offered and awaiting a choice; the player is paused while set
    pub pending_options: Option<Vec<LevelUpOption>>,
    /// Level-ups earned but not yet offered
    pub queued_level_ups: u32,

    pub account_id: Option<String>,
    pub cosmetic: String,
    pub is_bot: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, pos: Vec2, now: f64, is_bot: bool) -> Self {
        Self {
            id,
            name: name.into(),
            pos,
            angle: 0.0,
            moving: false,
            hp: PLAYER_BASE_HP,
            max_hp: PLAYER_BASE_HP,
            level: 1,
            xp: 0,
            total_xp: 0,
            score: 0,
            kills: 0,
            mob_kills: 0,
            weapons: STARTING_WEAPONS.iter().map(|k| WeaponInstance::new(*k)).collect(),
            passives: BTreeMap::new(),
            alive: true,
            immune_until: now + SPAWN_IMMUNITY_SECS,
            spawned_at: now,
            last_attacker: None,
            pending_options: None,
            queued_level_ups: 0,
            account_id: None,
            cosmetic: DEFAULT_COSMETIC.to_string(),
            is_bot,
        }
    }

    pub fn radius(&self) -> f32 {
        (PLAYER_BASE_RADIUS + self.level.saturating_sub(1) as f32 * PLAYER_RADIUS_PER_LEVEL)
            .min(PLAYER_MAX_RADIUS)
    }

    pub fn stats(&self) -> PassiveStats {
        PassiveStats::from_levels(&self.passives)
    }

    pub fn speed(&self) -> f32 {
        PLAYER_BASE_SPEED * self.stats().speed_mult
    }

    pub fn is_immune(&self, now: f64) -> bool {
        now < self.immune_until
    }

    /// Waiting on a level-up choice
    pub fn is_paused(&self) -> bool {
        self.pending_options.is_some()
    }

    pub fn hp_ratio(&self) -> f32 {
        if self.max_hp <= 0 {
            return 0.0;
        }
        self.hp as f32 / self.max_hp as f32
    }

    pub fn weapon(&self, kind: WeaponKind) -> Option<&WeaponInstance> {
        self.weapons.iter().find(|w| w.kind == kind)
    }

    pub fn has_weapon(&self, kind: WeaponKind) -> bool {
        self.weapon(kind).is_some()
    }

    pub fn passive_level(&self, kind: PassiveKind) -> u8 {
        self.passives.get(&kind).copied().unwrap_or(0)
    }

    /// Add XP and roll over levels. Returns the number of levels gained.
    pub fn add_xp(&mut self, amount: u32) -> u32 {
        self.xp = self.xp.saturating_add(amount);
        self.total_xp = self.total_xp.saturating_add(amount);
        self.score = self.score.saturating_add(amount);

        let mut gained = 0;
        while self.level < MAX_CHARACTER_LEVEL {
            let need = xp_to_next(self.level);
            if self.xp < need {
                break;
            }
            self.xp -= need;
            self.level += 1;
            gained += 1;
        }
        self.queued_level_ups += gained;
        gained
    }

    /// Subtract hp, clamped at zero. Returns true when this hit was lethal.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        if !self.alive || amount <= 0 {
            return false;
        }
        self.hp = (self.hp - amount).max(0);
        self.hp == 0
    }

    pub fn heal(&mut self, amount: i32) {
        self.hp = (self.hp + amount.max(0)).min(self.max_hp);
    }

    /// Recompute max hp from Vitality. Gains also heal by the same amount.
    pub fn refresh_max_hp(&mut self) {
        let new_max = PLAYER_BASE_HP + self.stats().bonus_hp;
        let gained = new_max - self.max_hp;
        self.max_hp = new_max;
        if gained > 0 {
            self.hp += gained;
        }
        self.hp = self.hp.clamp(0, self.max_hp);
    }

    /// Back to level 1 at `pos`. Identity, account and cosmetic are kept.
    pub fn respawn(&mut self, pos: Vec2, now: f64) {
        let fresh = Player::new(self.id, std::mem::take(&mut self.name), pos, now, self.is_bot);
        let account_id = self.account_id.take();
        let cosmetic = std::mem::take(&mut self.cosmetic);
        *self = Player {
            account_id,
            cosmetic,
            ..fresh
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        Player::new(PlayerId(1), "tester", Vec2::new(100.0, 100.0), 0.0, false)
    }

    #[test]
    fn test_xp_curve() {
        assert_eq!(xp_to_next(1), 10);
        assert_eq!(xp_to_next(2), 26); // 10 × 2^1.4 = 26.39
        assert!(xp_to_next(10) > xp_to_next(9));
    }

    #[test]
    fn test_new_player_defaults() {
        let p = player();
        assert_eq!(p.hp, 100);
        assert_eq!(p.level, 1);
        assert_eq!(p.weapons.len(), 2);
        assert!(p.has_weapon(WeaponKind::Orbit));
        assert!(p.has_weapon(WeaponKind::Bullet));
        assert!(p.is_immune(2.9));
        assert!(!p.is_immune(3.0));
        assert_eq!(p.radius(), 20.0);
    }

    #[test]
    fn test_radius_caps() {
        let mut p = player();
        p.level = 60;
        assert_eq!(p.radius(), PLAYER_MAX_RADIUS);
    }

    #[test]
    fn test_add_xp_rolls_levels() {
        let mut p = player();
        let gained = p.add_xp(40);
        // 10 to reach 2, 26 to reach 3, 4 left over
        assert_eq!(gained, 2);
        assert_eq!(p.level, 3);
        assert_eq!(p.xp, 4);
        assert_eq!(p.queued_level_ups, 2);
        assert_eq!(p.score, 40);
    }

    #[test]
    fn test_level_cap() {
        let mut p = player();
        p.add_xp(u32::MAX / 2);
        assert_eq!(p.level, MAX_CHARACTER_LEVEL);
    }

    #[test]
    fn test_damage_clamps_to_zero() {
        let mut p = player();
        assert!(!p.take_damage(30));
        assert_eq!(p.hp, 70);
        assert!(p.take_damage(500));
        assert_eq!(p.hp, 0);
    }

    #[test]
    fn test_vitality_heals_gain() {
        let mut p = player();
        p.take_damage(50);
        p.passives.insert(PassiveKind::Vitality, 1);
        p.refresh_max_hp();
        assert_eq!(p.max_hp, 120);
        assert_eq!(p.hp, 70);
    }

    #[test]
    fn test_respawn_keeps_identity() {
        let mut p = player();
        p.account_id = Some("acct-1".into());
        p.cosmetic = "neon".into();
        p.add_xp(100);
        p.alive = false;
        p.respawn(Vec2::new(5.0, 5.0), 10.0);
        assert_eq!(p.name, "tester");
        assert_eq!(p.id, PlayerId(1));
        assert_eq!(p.account_id.as_deref(), Some("acct-1"));
        assert_eq!(p.cosmetic, "neon");
        assert_eq!(p.level, 1);
        assert_eq!(p.score, 0);
        assert!(p.alive);
        assert!(p.is_immune(12.0));
    }
}
