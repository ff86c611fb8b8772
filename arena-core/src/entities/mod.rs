//! Entity records owned by a room: players, mobs, XP orbs.

mod ids;
pub mod mob;
pub mod orb;
pub mod player;

pub use ids::{IdAllocator, MobId, OrbId, PlayerId, TargetRef};
pub use mob::{Mob, MobKind, MobState, MobStats};
pub use orb::{orb_radius, scatter, split_xp, XpOrb};
pub use player::{xp_to_next, Player, DEFAULT_COSMETIC, STARTING_WEAPONS};
