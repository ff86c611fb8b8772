//! Persistent leaderboard store
//!
//! The backing store is external; rooms only need "remember the best score
//! per name" and "give me the top N". The in-memory implementation serves
//! tests and single-process deployments.

use arena_core::messages::LeaderboardEntry;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::ServerResult;

#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Record a final score; only improves an existing entry.
    async fn update(&self, name: &str, score: u32, level: u32) -> ServerResult<()>;

    /// Best entries, highest score first.
    async fn top(&self, n: usize) -> ServerResult<Vec<LeaderboardEntry>>;
}

#[derive(Debug, Default)]
pub struct InMemoryLeaderboard {
    best: RwLock<HashMap<String, (u32, u32)>>,
}

impl InMemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.best.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.best.read().is_empty()
    }
}

#[async_trait]
impl LeaderboardStore for InMemoryLeaderboard {
    async fn update(&self, name: &str, score: u32, level: u32) -> ServerResult<()> {
        let mut best = self.best.write();
        match best.get_mut(name) {
            Some(entry) if entry.0 >= score => {}
            Some(entry) => *entry = (score, level),
            None => {
                best.insert(name.to_string(), (score, level));
            }
        }
        Ok(())
    }

    async fn top(&self, n: usize) -> ServerResult<Vec<LeaderboardEntry>> {
        let best = self.best.read();
        let mut entries: Vec<LeaderboardEntry> = best
            .iter()
            .map(|(name, (score, level))| LeaderboardEntry {
                name: name.clone(),
                score: *score,
                level: *level,
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        entries.truncate(n);
        Ok(entries)
    }
}
