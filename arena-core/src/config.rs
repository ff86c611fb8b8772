//! Simulation configuration.

use serde::{Deserialize, Serialize};

/// Tunables for one room's simulation and broadcast cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Broadcasts per second
    pub broadcast_rate: u32,
    /// Every Nth broadcast is a full snapshot
    pub full_snapshot_every: u32,
    /// Upper bound on one tick's dt (seconds)
    pub max_dt: f64,
    pub map_size: f32,
    pub safe_zone_radius: f32,
    pub target_mobs: usize,
    /// Bots fill the room up to this many players
    pub min_players: usize,
    /// Seconds between live leaderboard broadcasts
    pub leaderboard_interval: f64,
    /// Fixed RNG seed; entropy when `None`
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30,
            broadcast_rate: 10,
            full_snapshot_every: 20,
            max_dt: 0.1,
            map_size: 4000.0,
            safe_zone_radius: 300.0,
            target_mobs: 120,
            min_players: 8,
            leaderboard_interval: 1.0,
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn tick_period_secs(&self) -> f64 {
        1.0 / self.tick_rate.max(1) as f64
    }

    pub fn broadcast_period_secs(&self) -> f64 {
        1.0 / self.broadcast_rate.max(1) as f64
    }

    pub fn map_center(&self) -> glam::Vec2 {
        glam::Vec2::splat(self.map_size / 2.0)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}
