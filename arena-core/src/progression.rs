//! Level-up options and weapon evolution.
//!
//! A level-up offers three options. Evolutions available to the player are
//! always listed first; the rest are drawn at random from new weapons,
//! weapon upgrades and passives. `Heal` fills any remaining slot.
//!
//! Options are re-validated when applied, so a stale or forged choice can
//! never put the loadout into an invalid state.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_WEAPON_SLOTS;
use crate::entities::Player;
use crate::passives::{PassiveKind, MAX_PASSIVE_LEVEL};
use crate::weapons::{WeaponInstance, WeaponKind};

/// Options per level-up
pub const OPTIONS_PER_LEVEL: usize = 3;

/// Fraction of max hp restored by the `Heal` filler
pub const HEAL_FRACTION: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LevelUpOption {
    Evolve { weapon: WeaponKind },
    NewWeapon { weapon: WeaponKind },
    Upgrade { weapon: WeaponKind, level: u8 },
    Passive { passive: PassiveKind, level: u8 },
    Heal,
}

impl LevelUpOption {
    pub fn label(&self) -> String {
        match self {
            Self::Evolve { weapon } => format!("Evolve: {}", weapon.name()),
            Self::NewWeapon { weapon } => format!("New: {}", weapon.name()),
            Self::Upgrade { weapon, level } => format!("{} Lv{}", weapon.name(), level),
            Self::Passive { passive, level } => format!("{} Lv{}", passive.name(), level),
            Self::Heal => "Heal".to_string(),
        }
    }
}

// ============================================================================
// Option generation
// ============================================================================

/// Evolutions whose two recipe weapons are owned and both maxed.
pub fn available_evolutions(player: &Player) -> Vec<WeaponKind> {
    WeaponKind::EVOLVED
        .iter()
        .copied()
        .filter(|evolved| !player.has_weapon(*evolved) && recipe_ready(player, *evolved))
        .collect()
}

fn recipe_ready(player: &Player, evolved: WeaponKind) -> bool {
    match evolved.recipe() {
        Some(parts) => parts
            .iter()
            .all(|k| player.weapon(*k).is_some_and(|w| w.is_maxed())),
        None => false,
    }
}

/// A base weapon already folded into an owned evolution is not offered again.
fn consumed(player: &Player, kind: WeaponKind) -> bool {
    player.weapons.iter().any(|w| {
        w.kind
            .recipe()
            .is_some_and(|parts| parts.contains(&kind))
    })
}

fn draw_pool(player: &Player) -> Vec<LevelUpOption> {
    let mut pool = Vec::new();
    if player.weapons.len() < MAX_WEAPON_SLOTS {
        for kind in WeaponKind::BASE {
            if !player.has_weapon(kind) && !consumed(player, kind) {
                pool.push(LevelUpOption::NewWeapon { weapon: kind });
            }
        }
    }
    for w in &player.weapons {
        if !w.is_maxed() {
            pool.push(LevelUpOption::Upgrade {
                weapon: w.kind,
                level: w.level + 1,
            });
        }
    }
    for passive in PassiveKind::ALL {
        let level = player.passive_level(passive);
        if level < MAX_PASSIVE_LEVEL {
            pool.push(LevelUpOption::Passive {
                passive,
                level: level + 1,
            });
        }
    }
    pool
}

pub fn generate_options<R: Rng + ?Sized>(player: &Player, rng: &mut R) -> Vec<LevelUpOption> {
    let mut options: Vec<LevelUpOption> = available_evolutions(player)
        .into_iter()
        .take(OPTIONS_PER_LEVEL)
        .map(|weapon| LevelUpOption::Evolve { weapon })
        .collect();

    let mut pool = draw_pool(player);
    pool.shuffle(rng);
    let missing = OPTIONS_PER_LEVEL - options.len();
    options.extend(pool.into_iter().take(missing));

    while options.len() < OPTIONS_PER_LEVEL {
        options.push(LevelUpOption::Heal);
    }
    options
}

// ============================================================================
// Applying choices
// ============================================================================

/// Apply one option. Returns false (and changes nothing) if it is no longer
/// valid for this player.
pub fn apply_option(player: &mut Player, option: LevelUpOption) -> bool {
    match option {
        LevelUpOption::Evolve { weapon } => evolve(player, weapon),
        LevelUpOption::NewWeapon { weapon } => {
            if weapon.is_evolved()
                || player.has_weapon(weapon)
                || player.weapons.len() >= MAX_WEAPON_SLOTS
            {
                return false;
            }
            player.weapons.push(WeaponInstance::new(weapon));
            true
        }
        LevelUpOption::Upgrade { weapon, .. } => {
            match player.weapons.iter_mut().find(|w| w.kind == weapon) {
                Some(w) if !w.is_maxed() => {
                    w.level += 1;
                    true
                }
                _ => false,
            }
        }
        LevelUpOption::Passive { passive, .. } => {
            let level = player.passives.entry(passive).or_insert(0);
            if *level >= MAX_PASSIVE_LEVEL {
                return false;
            }
            *level += 1;
            if passive == PassiveKind::Vitality {
                player.refresh_max_hp();
            }
            true
        }
        LevelUpOption::Heal => {
            let amount = (player.max_hp as f32 * HEAL_FRACTION).round() as i32;
            player.heal(amount);
            true
        }
    }
}

/// Replace both recipe weapons with a level-1 evolved weapon in one assignment.
pub fn evolve(player: &mut Player, evolved: WeaponKind) -> bool {
    let Some(parts) = evolved.recipe() else {
        return false;
    };
    if player.has_weapon(evolved) || !recipe_ready(player, evolved) {
        return false;
    }
    let mut next: Vec<WeaponInstance> = player
        .weapons
        .iter()
        .filter(|w| !parts.contains(&w.kind))
        .copied()
        .collect();
    next.push(WeaponInstance::new(evolved));
    player.weapons = next;
    true
}

/// Offer the next queued level-up if the player is not already choosing.
pub fn offer_next<R: Rng + ?Sized>(player: &mut Player, rng: &mut R) -> Option<Vec<LevelUpOption>> {
    if player.is_paused() || player.queued_level_ups == 0 || !player.alive {
        return None;
    }
    player.queued_level_ups -= 1;
    let options = generate_options(player, rng);
    player.pending_options = Some(options.clone());
    Some(options)
}

/// Resolve the pending choice. An out-of-range index leaves everything as is.
pub fn choose(player: &mut Player, index: usize) -> Option<LevelUpOption> {
    let option = *player.pending_options.as_ref()?.get(index)?;
    player.pending_options = None;
    apply_option(player, option);
    Some(option)
}
