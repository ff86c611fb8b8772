//! Arena Core - authoritative survival-arena simulation
//!
//! This crate holds the deterministic game logic for one arena room:
//! - Entities (players, mobs, XP orbs) and their id space
//! - Weapon behaviours, evolutions and the shared damage pipeline
//! - Passives and level-up progression
//! - Mob AI and spawner
//! - Bot controller (personalities, decision state machine)
//! - Spatial hash for proximity queries
//! - Room tick loop with full/delta snapshot encoding
//! - Client/server message types
//!
//! Nothing here does I/O; the server crate drives rooms on its own clock.

pub mod bots;
pub mod config;
pub mod constants;
pub mod entities;
pub mod error;
pub mod geometry;
pub mod messages;
pub mod mobs;
pub mod passives;
pub mod progression;
pub mod room;
pub mod spatial;
pub mod weapons;

pub use config::SimConfig;
pub use error::SimError;
pub use messages::{ClientMessage, ServerMessage};
pub use room::{Recipient, Room, RoomEvent, TickReport};
