//! Server configuration: defaults, optional JSON file, env overrides.

use arena_core::config::SimConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

use crate::codec::WireFormat;
use crate::error::{ServerError, ServerResult};
use crate::logging::{LogLevel, TracingConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub sim: SimConfig,
    /// Real players per room before a new room is opened
    pub max_players_per_room: usize,
    /// Outbound messages buffered per client before drops
    pub client_queue_depth: usize,
    pub wire_format: WireFormat,
    /// Seconds between empty-room sweeps
    pub reap_interval: f64,
    /// Bot-only rooms started with the process and never reaped
    pub headless_rooms: usize,
    pub tracing: TracingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            sim: SimConfig::default(),
            max_players_per_room: 30,
            client_queue_depth: 64,
            wire_format: WireFormat::Json,
            reap_interval: 10.0,
            headless_rooms: 1,
            tracing: TracingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `ARENA_CONFIG` file (if set), then per-field environment overrides.
    pub fn from_env() -> ServerResult<Self> {
        let mut config = match std::env::var("ARENA_CONFIG") {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| ServerError::Config(format!("{path}: {e}")))?;
                Self::from_json(&text)
                    .ok_or_else(|| ServerError::Config(format!("{path}: invalid config JSON")))?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from any key lookup. Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_with(&lookup, "TICK_RATE", &mut self.sim.tick_rate);
        override_with(&lookup, "BROADCAST_RATE", &mut self.sim.broadcast_rate);
        override_with(&lookup, "MIN_PLAYERS", &mut self.sim.min_players);
        override_with(&lookup, "TARGET_MOBS", &mut self.sim.target_mobs);
        override_with(&lookup, "MAX_PLAYERS_PER_ROOM", &mut self.max_players_per_room);
        override_with(&lookup, "WIRE_FORMAT", &mut self.wire_format);
        override_with(&lookup, "HEADLESS_ROOMS", &mut self.headless_rooms);
        if let Some(level) = lookup("LOG_LEVEL").and_then(|v| LogLevel::parse(&v)) {
            self.tracing.default_level = level;
        }
        self.sim.tick_rate = self.sim.tick_rate.max(1);
        self.sim.broadcast_rate = self.sim.broadcast_rate.clamp(1, self.sim.tick_rate);
        self.max_players_per_room = self.max_players_per_room.max(1);
        self.client_queue_depth = self.client_queue_depth.max(1);
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

fn override_with<T, F>(lookup: &F, key: &str, slot: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => warn!(key, value = %raw, "ignoring invalid config override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let c = ServerConfig::default();
        assert_eq!(c.max_players_per_room, 30);
        assert_eq!(c.sim.tick_rate, 30);
        assert_eq!(c.wire_format, WireFormat::Json);
    }

    #[test]
    fn test_overrides() {
        let mut c = ServerConfig::default();
        c.apply_overrides(env(&[
            ("TICK_RATE", "60"),
            ("MAX_PLAYERS_PER_ROOM", "12"),
            ("WIRE_FORMAT", "bincode"),
            ("LOG_LEVEL", "debug"),
        ]));
        assert_eq!(c.sim.tick_rate, 60);
        assert_eq!(c.max_players_per_room, 12);
        assert_eq!(c.wire_format, WireFormat::Bincode);
        assert_eq!(c.tracing.default_level, LogLevel::Debug);
    }

    #[test]
    fn test_invalid_override_keeps_default() {
        let mut c = ServerConfig::default();
        c.apply_overrides(env(&[("TICK_RATE", "fast"), ("TARGET_MOBS", "-3")]));
        assert_eq!(c.sim.tick_rate, 30);
        assert_eq!(c.sim.target_mobs, 120);
    }

    #[test]
    fn test_broadcast_never_faster_than_tick() {
        let mut c = ServerConfig::default();
        c.apply_overrides(env(&[("TICK_RATE", "10"), ("BROADCAST_RATE", "50")]));
        assert_eq!(c.sim.broadcast_rate, 10);
    }

    #[test]
    fn test_json_partial() {
        let c = ServerConfig::from_json(r#"{"headless_rooms": 3, "sim": {"map_size": 2000.0}}"#).unwrap();
        assert_eq!(c.headless_rooms, 3);
        assert_eq!(c.sim.map_size, 2000.0);
        assert_eq!(c.sim.tick_rate, 30);
    }
}
