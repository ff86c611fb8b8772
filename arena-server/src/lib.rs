//! Arena Server Library
//!
//! Runtime around the `arena_core` simulation:
//! - One tokio worker per room (fixed tick + slower broadcast)
//! - Room manager: placement, capacity, reaping
//! - Wire codec (JSON / bincode frames)
//! - Leaderboard and account store interfaces with in-memory backends
//! - Lock-free runtime metrics with Prometheus text export
//! - Environment-driven configuration and tracing setup

pub mod accounts;
pub mod codec;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod logging;
pub mod metrics;
pub mod room_manager;
pub mod room_worker;

pub use codec::WireFormat;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use room_manager::RoomManager;
pub use room_worker::{Frame, RoomHandle};
