//! Centralized game constants for the arena simulation.
//!
//! Room-level tunables (tick rates, map size, population targets) live in
//! [`crate::config::SimConfig`]; the values here are balance numbers shared by
//! several modules. Per-weapon and per-mob stats stay next to their behaviour.

// =====================================================
// Player
// =====================================================

/// Radius of a level-1 player
pub const PLAYER_BASE_RADIUS: f32 = 20.0;

/// Radius gained per character level above 1
pub const PLAYER_RADIUS_PER_LEVEL: f32 = 1.5;

/// Radius cap regardless of level
pub const PLAYER_MAX_RADIUS: f32 = 44.0;

/// Base movement speed (units per second)
pub const PLAYER_BASE_SPEED: f32 = 220.0;

/// Base max hp before Vitality
pub const PLAYER_BASE_HP: i32 = 100;

/// Spawn immunity window (seconds)
pub const SPAWN_IMMUNITY_SECS: f64 = 3.0;

/// Character level cap; XP beyond it only adds score
pub const MAX_CHARACTER_LEVEL: u32 = 60;

/// Maximum weapon instances a player may own
pub const MAX_WEAPON_SLOTS: usize = 4;

/// Score awarded per player kill
pub const PLAYER_KILL_SCORE: u32 = 25;

/// Score awarded per mob kill (on top of collected XP)
pub const MOB_KILL_SCORE: u32 = 1;

// =====================================================
// Damage pipeline
// =====================================================

/// Damage bonus per weapon level above 1
pub const WEAPON_LEVEL_DAMAGE_STEP: f32 = 0.2;

/// Damage bonus per character level above 1
pub const CHARACTER_LEVEL_DAMAGE_STEP: f32 = 0.02;

/// Fire-rate bonus per character level above 1
pub const CHARACTER_LEVEL_RATE_STEP: f32 = 0.01;

/// Critical damage multiplier
pub const CRIT_DAMAGE_MULT: f32 = 2.0;

/// Hit cooldown shared by orbit-style and wave-style weapons (seconds)
pub const CONTACT_HIT_WINDOW: f64 = 0.2;

/// Slack for comparing accumulated simulation timestamps against a window
pub const TIME_EPSILON: f64 = 1e-9;

/// Cooldown/hit-set bookkeeping is pruned once it holds more entries than this
pub const HIT_LEDGER_PRUNE_THRESHOLD: usize = 256;

/// Entries older than this are evicted when pruning (seconds)
pub const HIT_LEDGER_MAX_AGE: f64 = 1.0;

/// Radius searched around a player for weapon targets
pub const WEAPON_QUERY_RADIUS: f32 = 760.0;

// =====================================================
// XP and orbs
// =====================================================

/// XP orb lifetime on the ground (seconds)
pub const ORB_LIFETIME_SECS: f32 = 30.0;

/// Largest orb radius regardless of amount
pub const ORB_MAX_RADIUS: f32 = 14.0;

/// Base magnet radius before the Magnet passive
pub const ORB_MAGNET_RADIUS: f32 = 90.0;

/// Speed orbs travel toward a magnetizing player (units per second)
pub const ORB_MAGNET_SPEED: f32 = 420.0;

/// Flat XP dropped by every player death
pub const DEATH_XP_BASE: u32 = 10;

/// Maximum orbs a single death scatters
pub const DEATH_ORB_COUNT: u32 = 8;

/// Scatter radius for death orbs
pub const DEATH_ORB_SCATTER: f32 = 60.0;

// =====================================================
// Mobs
// =====================================================

/// Mobs pursue living targets within this distance
pub const MOB_CHASE_RADIUS: f32 = 400.0;

/// Wander heading is resampled within this range (seconds)
pub const MOB_WANDER_MIN_SECS: f64 = 2.0;
pub const MOB_WANDER_MAX_SECS: f64 = 5.0;

/// Spawner period (seconds)
pub const MOB_SPAWN_INTERVAL: f64 = 0.5;

/// Maximum mobs spawned per spawner run
pub const MOB_SPAWN_BATCH: usize = 6;

/// Random positions tried per spawn before giving up
pub const MOB_SPAWN_ATTEMPTS: usize = 10;

/// Spawns are rejected this close to any living player
pub const MOB_SPAWN_MIN_PLAYER_DIST: f32 = 350.0;

/// Per-(mob, player) contact damage cooldown (seconds)
pub const MOB_CONTACT_COOLDOWN: f64 = 0.6;

// =====================================================
// Bots
// =====================================================

/// Bot decision countdown range (seconds)
pub const BOT_DECISION_MIN_SECS: f32 = 0.3;
pub const BOT_DECISION_MAX_SECS: f32 = 0.6;

/// Below this hp ratio a bot flees
pub const BOT_FLEE_HP_RATIO: f32 = 0.25;

/// Threat search radius while fleeing
pub const BOT_THREAT_RADIUS: f32 = 300.0;

/// Orbs within this distance are worth collecting
pub const BOT_COLLECT_RADIUS: f32 = 150.0;

/// Aggressive bots hunt players weaker than this hp ratio...
pub const BOT_HUNT_HP_RATIO: f32 = 0.5;
/// ...that are closer than this...
pub const BOT_HUNT_RADIUS: f32 = 350.0;
/// ...and give up beyond this distance
pub const BOT_HUNT_ABANDON_RADIUS: f32 = 600.0;

/// Mob search radius for farming
pub const BOT_FARM_RADIUS: f32 = 400.0;

/// Distance at which farming bots circle instead of closing in
pub const BOT_MELEE_RANGE: f32 = 90.0;

/// Roaming bots turn inward this close to the map edge
pub const BOT_EDGE_MARGIN: f32 = 200.0;

/// Roaming bots move outward this close to the exact map centre
pub const BOT_CENTER_AVOID_RADIUS: f32 = 150.0;

/// Chance a roaming bot keeps moving on each heading resample
pub const BOT_ROAM_MOVE_CHANCE: f64 = 0.85;
