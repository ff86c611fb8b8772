//! Room placement and lifecycle.
//!
//! Guarantees one worker per room id, fills the fullest room that still has
//! space, and only tears down rooms with no real players attached. Headless
//! rooms (started with the process, bot-only until someone joins) are never
//! reaped.

use arena_core::entities::PlayerId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::accounts::{resolve_cosmetic, AccountStore};
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::leaderboard::LeaderboardStore;
use crate::metrics::RoomMetrics;
use crate::room_worker::{spawn_room, Frame, JoinRequest, RoomHandle};

struct ManagedRoom {
    handle: RoomHandle,
    task: JoinHandle<()>,
    headless: bool,
}

pub struct RoomManager {
    config: ServerConfig,
    leaderboard: Arc<dyn LeaderboardStore>,
    accounts: Arc<dyn AccountStore>,
    metrics: Arc<RoomMetrics>,
    rooms: Mutex<BTreeMap<String, ManagedRoom>>,
    next_room: AtomicU64,
}

impl RoomManager {
    pub fn new(
        config: ServerConfig,
        leaderboard: Arc<dyn LeaderboardStore>,
        accounts: Arc<dyn AccountStore>,
        metrics: Arc<RoomMetrics>,
    ) -> Self {
        Self {
            config,
            leaderboard,
            accounts,
            metrics,
            rooms: Mutex::new(BTreeMap::new()),
            next_room: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<RoomMetrics> {
        &self.metrics
    }

    pub fn leaderboard(&self) -> &Arc<dyn LeaderboardStore> {
        &self.leaderboard
    }

    fn open_room(&self, rooms: &mut BTreeMap<String, ManagedRoom>, headless: bool) -> RoomHandle {
        let id = format!("room-{}", self.next_room.fetch_add(1, Ordering::Relaxed));
        let (handle, task) = spawn_room(
            id.clone(),
            &self.config,
            self.leaderboard.clone(),
            self.metrics.clone(),
        );
        info!(room = %id, headless, "room opened");
        rooms.insert(
            id,
            ManagedRoom {
                handle: handle.clone(),
                task,
                headless,
            },
        );
        handle
    }

    /// Start the configured bot-only rooms.
    pub fn start_headless(&self) -> Vec<String> {
        let mut rooms = self.rooms.lock();
        (0..self.config.headless_rooms)
            .map(|_| self.open_room(&mut rooms, true).id().to_string())
            .collect()
    }

    /// Place a player: fullest room with space, else a new one.
    pub async fn join(
        &self,
        name: &str,
        cosmetic: Option<&str>,
        account_id: Option<String>,
        outbound: mpsc::Sender<Frame>,
    ) -> ServerResult<(RoomHandle, PlayerId)> {
        let cosmetic =
            resolve_cosmetic(self.accounts.as_ref(), account_id.as_deref(), cosmetic).await;
        let handle = {
            let mut rooms = self.rooms.lock();
            let cap = self.config.max_players_per_room;
            let chosen = rooms
                .values()
                .filter(|r| !r.handle.is_closed() && r.handle.connected() < cap)
                .max_by_key(|r| r.handle.connected())
                .map(|r| r.handle.clone());
            let handle = match chosen {
                Some(h) => h,
                None => self.open_room(&mut rooms, false),
            };
            handle.reserve();
            handle
        };
        let request = JoinRequest {
            name: name.to_string(),
            cosmetic,
            account_id,
        };
        let id = handle.join_reserved(request, outbound).await?;
        Ok((handle, id))
    }

    pub fn room(&self, id: &str) -> Option<RoomHandle> {
        self.rooms.lock().get(id).map(|r| r.handle.clone())
    }

    pub fn room_ids(&self) -> Vec<String> {
        self.rooms.lock().keys().cloned().collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }

    /// Shut down rooms with no real players (and any whose worker died).
    pub fn reap(&self) -> Vec<String> {
        let mut rooms = self.rooms.lock();
        let doomed: Vec<String> = rooms
            .iter()
            .filter(|(_, r)| {
                r.task.is_finished() || (!r.headless && r.handle.connected() == 0)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &doomed {
            if let Some(r) = rooms.remove(id) {
                if r.task.is_finished() {
                    warn!(room = %id, "room worker exited unexpectedly");
                }
                r.handle.shutdown();
                info!(room = %id, "room reaped");
            }
        }
        doomed
    }

    /// Periodic reaping on `reap_interval`.
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let period = Duration::from_secs_f64(self.config.reap_interval.max(0.1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.reap();
            }
        })
    }

    /// Stop every room and wait for the workers to exit.
    pub async fn shutdown(&self) {
        let rooms: Vec<ManagedRoom> = {
            let mut rooms = self.rooms.lock();
            std::mem::take(&mut *rooms).into_values().collect()
        };
        for r in &rooms {
            r.handle.shutdown();
        }
        for r in rooms {
            if let Err(e) = r.task.await {
                warn!(room = %r.handle.id(), error = %e, "room worker failed");
            }
        }
    }
}
