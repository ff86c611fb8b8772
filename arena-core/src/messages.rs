//! Client ↔ server message types.
//!
//! Externally tagged enums so the same types encode as JSON frames
//! (`{"input":{"angle":1.2,"moving":true}}`) or bincode.

use serde::{Deserialize, Serialize};

use crate::entities::PlayerId;
use crate::progression::LevelUpOption;
use crate::room::snapshot::GameState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Join {
        name: String,
        cosmetic: Option<String>,
        account_id: Option<String>,
    },
    Input {
        angle: f32,
        moving: bool,
    },
    #[serde(rename_all = "camelCase")]
    LevelUp {
        choice_index: usize,
    },
    Respawn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelUpChoice {
    pub option: LevelUpOption,
    pub label: String,
}

impl From<LevelUpOption> for LevelUpChoice {
    fn from(option: LevelUpOption) -> Self {
        Self {
            label: option.label(),
            option,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathStats {
    pub level: u32,
    pub score: u32,
    pub kills: u32,
    pub survived_secs: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u32,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Joined {
        player_id: PlayerId,
        room: String,
        map_size: f32,
        safe_zone_radius: f32,
    },
    GameState(GameState),
    LevelUp {
        options: Vec<LevelUpChoice>,
    },
    #[serde(rename_all = "camelCase")]
    Death {
        killer_name: String,
        stats: DeathStats,
    },
    Leaderboard {
        entries: Vec<LeaderboardEntry>,
    },
    KillFeed {
        killer: String,
        victim: String,
    },
    PlayerCount {
        count: usize,
    },
}
