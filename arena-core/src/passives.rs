//! Passive stat modifiers picked at level-up.
//!
//! Each passive is a permanent multiplier independent of weapon choice. The
//! player record stores `PassiveKind -> level`; the helpers here turn that map
//! into the factors the weapon engine and room apply.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::CRIT_DAMAGE_MULT;

/// Highest level any passive reaches
pub const MAX_PASSIVE_LEVEL: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PassiveKind {
    Might,     // +10% damage
    Haste,     // -8% cooldowns
    Area,      // +10% radius/range
    Precision, // +5% crit chance
    Armor,     // 6% damage reduction
    Swiftness, // +8% move speed
    Vitality,  // +20 max hp
    Magnet,    // +25% pickup radius
}

impl PassiveKind {
    pub const ALL: [PassiveKind; 8] = [
        PassiveKind::Might,
        PassiveKind::Haste,
        PassiveKind::Area,
        PassiveKind::Precision,
        PassiveKind::Armor,
        PassiveKind::Swiftness,
        PassiveKind::Vitality,
        PassiveKind::Magnet,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Might => "Might",
            Self::Haste => "Haste",
            Self::Area => "Area",
            Self::Precision => "Precision",
            Self::Armor => "Armor",
            Self::Swiftness => "Swiftness",
            Self::Vitality => "Vitality",
            Self::Magnet => "Magnet",
        }
    }
}

/// Max hp gained per Vitality level
pub const VITALITY_HP_PER_LEVEL: i32 = 20;

const MIGHT_STEP: f32 = 0.10;
const HASTE_STEP: f32 = 0.08;
const AREA_STEP: f32 = 0.10;
const PRECISION_STEP: f32 = 0.05;
const ARMOR_STEP: f32 = 0.06;
const SWIFTNESS_STEP: f32 = 0.08;
const MAGNET_STEP: f32 = 0.25;

/// Derived multipliers for one player's passive levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassiveStats {
    pub damage_mult: f32,
    pub cooldown_mult: f32,
    pub area_mult: f32,
    pub crit_chance: f32,
    pub crit_mult: f32,
    pub armor_reduction: f32,
    pub speed_mult: f32,
    pub magnet_mult: f32,
    pub bonus_hp: i32,
}

impl Default for PassiveStats {
    fn default() -> Self {
        Self::from_levels(&BTreeMap::new())
    }
}

impl PassiveStats {
    pub fn from_levels(levels: &BTreeMap<PassiveKind, u8>) -> Self {
        let lvl = |k: PassiveKind| levels.get(&k).copied().unwrap_or(0) as f32;
        Self {
            damage_mult: 1.0 + lvl(PassiveKind::Might) * MIGHT_STEP,
            cooldown_mult: (1.0 - lvl(PassiveKind::Haste) * HASTE_STEP).max(0.2),
            area_mult: 1.0 + lvl(PassiveKind::Area) * AREA_STEP,
            crit_chance: (lvl(PassiveKind::Precision) * PRECISION_STEP).min(1.0),
            crit_mult: CRIT_DAMAGE_MULT,
            armor_reduction: (lvl(PassiveKind::Armor) * ARMOR_STEP).min(0.9),
            speed_mult: 1.0 + lvl(PassiveKind::Swiftness) * SWIFTNESS_STEP,
            magnet_mult: 1.0 + lvl(PassiveKind::Magnet) * MAGNET_STEP,
            bonus_hp: lvl(PassiveKind::Vitality) as i32 * VITALITY_HP_PER_LEVEL,
        }
    }
}
