//! One tokio task per room.
//!
//! ```text
//! RoomHandle ──(unbounded mpsc: Join / Client / Leave / Shutdown)──┐
//!                                                                  ↓
//!                                   RoomWorker (owns Room exclusively)
//!                                     ├─ tick interval      → Room::tick (catch_unwind)
//!                                     ├─ broadcast interval → GameState frame
//!                                     └─ RoomEvents → per-client bounded queues (try_send)
//! ```
//!
//! Inputs are applied by the room at the start of its next tick. The worker
//! never awaits on a client: a full queue drops the frame, a closed queue
//! removes the player on the next tick.

use arena_core::entities::PlayerId;
use arena_core::error::SimError;
use arena_core::messages::{ClientMessage, ServerMessage};
use arena_core::room::{Recipient, Room, RoomEvent};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::codec::WireFormat;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::leaderboard::LeaderboardStore;
use crate::metrics::RoomMetrics;

/// Encoded outbound frame, shared between recipients of a broadcast.
pub type Frame = Arc<[u8]>;

#[derive(Debug, Clone, PartialEq)]
pub struct JoinRequest {
    pub name: String,
    /// Already validated against the account store
    pub cosmetic: String,
    pub account_id: Option<String>,
}

#[derive(Debug)]
pub enum RoomCommand {
    Join {
        request: JoinRequest,
        outbound: mpsc::Sender<Frame>,
        reply: oneshot::Sender<PlayerId>,
    },
    Client {
        player: PlayerId,
        msg: ClientMessage,
    },
    Leave {
        player: PlayerId,
    },
    Shutdown,
}

/// Counters the manager reads without talking to the worker.
#[derive(Debug, Default)]
pub struct RoomStats {
    /// Real players connected or joining
    pub connected: AtomicUsize,
    pub bots: AtomicUsize,
    pub ticks: AtomicU64,
}

impl RoomStats {
    fn release(&self) {
        let _ = self
            .connected
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

// ============================================================================
// Handle
// ============================================================================

#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: String,
    tx: mpsc::UnboundedSender<RoomCommand>,
    stats: Arc<RoomStats>,
    format: WireFormat,
}

impl RoomHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn connected(&self) -> usize {
        self.stats.connected.load(Ordering::Acquire)
    }

    pub fn bots(&self) -> usize {
        self.stats.bots.load(Ordering::Relaxed)
    }

    pub fn ticks(&self) -> u64 {
        self.stats.ticks.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn wire_format(&self) -> WireFormat {
        self.format
    }

    /// Count a player against this room before the join lands.
    pub(crate) fn reserve(&self) {
        self.stats.connected.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release(&self) {
        self.stats.release();
    }

    /// Join a reserved slot. The slot is released if the join fails.
    pub(crate) async fn join_reserved(
        &self,
        request: JoinRequest,
        outbound: mpsc::Sender<Frame>,
    ) -> ServerResult<PlayerId> {
        let (reply, rx) = oneshot::channel();
        let cmd = RoomCommand::Join {
            request,
            outbound,
            reply,
        };
        if self.tx.send(cmd).is_err() {
            self.release();
            return Err(ServerError::RoomClosed(self.id.clone()));
        }
        match rx.await {
            Ok(id) => Ok(id),
            Err(_) => {
                self.release();
                Err(ServerError::RoomClosed(self.id.clone()))
            }
        }
    }

    pub async fn join(&self, request: JoinRequest, outbound: mpsc::Sender<Frame>) -> ServerResult<PlayerId> {
        self.reserve();
        self.join_reserved(request, outbound).await
    }

    pub fn send(&self, player: PlayerId, msg: ClientMessage) -> ServerResult<()> {
        self.command(RoomCommand::Client { player, msg })
    }

    /// Decode and forward a raw client frame. Undecodable frames are dropped.
    pub fn submit_frame(&self, player: PlayerId, frame: &[u8]) -> ServerResult<()> {
        match self.format.decode(frame) {
            Ok(msg) => self.send(player, msg),
            Err(e) => {
                debug!(room = %self.id, %player, error = %e, "dropping malformed frame");
                Ok(())
            }
        }
    }

    pub fn leave(&self, player: PlayerId) -> ServerResult<()> {
        self.command(RoomCommand::Leave { player })
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(RoomCommand::Shutdown);
    }

    fn command(&self, cmd: RoomCommand) -> ServerResult<()> {
        self.tx
            .send(cmd)
            .map_err(|_| ServerError::RoomClosed(self.id.clone()))
    }
}

// ============================================================================
// Worker
// ============================================================================

pub fn spawn_room(
    id: impl Into<String>,
    config: &ServerConfig,
    leaderboard: Arc<dyn LeaderboardStore>,
    metrics: Arc<RoomMetrics>,
) -> (RoomHandle, JoinHandle<()>) {
    let id = id.into();
    let (tx, rx) = mpsc::unbounded_channel();
    let stats = Arc::new(RoomStats::default());
    let handle = RoomHandle {
        id: id.clone(),
        tx,
        stats: stats.clone(),
        format: config.wire_format,
    };
    let worker = RoomWorker {
        room: Room::new(id, config.sim.clone()),
        clients: HashMap::new(),
        format: config.wire_format,
        leaderboard,
        metrics,
        stats,
        tick_period: Duration::from_secs_f64(config.sim.tick_period_secs()),
        broadcast_period: Duration::from_secs_f64(config.sim.broadcast_period_secs()),
        last_tick: Instant::now(),
        population: (0, 0),
    };
    let task = tokio::spawn(worker.run(rx));
    (handle, task)
}

struct RoomWorker {
    room: Room,
    clients: HashMap<PlayerId, mpsc::Sender<Frame>>,
    format: WireFormat,
    leaderboard: Arc<dyn LeaderboardStore>,
    metrics: Arc<RoomMetrics>,
    stats: Arc<RoomStats>,
    tick_period: Duration,
    broadcast_period: Duration,
    last_tick: Instant,
    /// (humans, bots) last reported to the metrics gauges
    population: (usize, usize),
}

impl RoomWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RoomCommand>) {
        info!(room = %self.room.id(), "room started");
        self.metrics.rooms.fetch_add(1, Ordering::Relaxed);

        let mut tick = tokio::time::interval(self.tick_period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcast = tokio::time::interval(self.broadcast_period);
        broadcast.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.last_tick = Instant::now();

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(RoomCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                _ = tick.tick() => self.step(),
                _ = broadcast.tick() => self.broadcast(),
            }
        }

        self.metrics.adjust_population(self.population, (0, 0));
        self.metrics.rooms.fetch_sub(1, Ordering::Relaxed);
        info!(room = %self.room.id(), "room stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                request,
                outbound,
                reply,
            } => {
                let id = self.room.join(
                    &request.name,
                    Some(request.cosmetic),
                    request.account_id,
                );
                self.clients.insert(id, outbound);
                let joined = self.room.joined_message(id);
                let full = ServerMessage::GameState(self.room.full_state());
                self.send_to(id, &joined);
                self.send_to(id, &full);
                if reply.send(id).is_err() {
                    // Caller went away mid-join
                    self.drop_client(id);
                }
            }
            RoomCommand::Client { player, msg } => {
                if self.clients.contains_key(&player) {
                    self.room.handle_message(player, msg);
                } else {
                    debug!(room = %self.room.id(), %player, "input from unknown player");
                }
            }
            RoomCommand::Leave { player } => self.drop_client(player),
            RoomCommand::Shutdown => {}
        }
    }

    fn drop_client(&mut self, player: PlayerId) {
        if self.clients.remove(&player).is_some() {
            self.room.leave(player);
            self.stats.release();
        }
    }

    fn step(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;

        let room = &mut self.room;
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| room.tick(dt)));
        let ok = match result {
            Ok(Ok(report)) => {
                if report.player_kills > 0 {
                    debug!(room = %self.room.id(), kills = report.player_kills, "tick kills");
                }
                true
            }
            Ok(Err(e)) => {
                warn!(room = %self.room.id(), error = %e, "tick fault");
                false
            }
            Err(payload) => {
                let e = SimError::TickPanicked(panic_message(payload.as_ref()));
                error!(room = %self.room.id(), error = %e, "tick panicked");
                false
            }
        };
        self.metrics.record_tick(now.elapsed(), self.tick_period, ok);
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);

        self.dispatch_events();
        self.update_population();
    }

    fn dispatch_events(&mut self) {
        for event in self.room.drain_events() {
            match event {
                RoomEvent::Send {
                    to: Recipient::All,
                    msg,
                } => self.send_all(&msg),
                RoomEvent::Send {
                    to: Recipient::Player(id),
                    msg,
                } => self.send_to(id, &msg),
                RoomEvent::RecordScore { name, score, level } => {
                    let store = self.leaderboard.clone();
                    tokio::spawn(async move {
                        if let Err(e) = store.update(&name, score, level).await {
                            warn!(name = %name, error = %e, "leaderboard write failed");
                        }
                    });
                }
            }
        }
    }

    fn broadcast(&mut self) {
        let state = self.room.broadcast_state();
        if self.clients.is_empty() {
            return;
        }
        self.send_all(&ServerMessage::GameState(state));
        self.metrics.record_broadcast();
    }

    fn encode(&self, msg: &ServerMessage) -> Option<Frame> {
        match self.format.encode(msg) {
            Ok(bytes) => Some(Frame::from(bytes)),
            Err(e) => {
                error!(room = %self.room.id(), error = %e, "failed to encode message");
                None
            }
        }
    }

    fn send_to(&mut self, id: PlayerId, msg: &ServerMessage) {
        if let Some(frame) = self.encode(msg) {
            self.deliver(id, frame);
        }
    }

    fn send_all(&mut self, msg: &ServerMessage) {
        let Some(frame) = self.encode(msg) else {
            return;
        };
        let ids: Vec<PlayerId> = self.clients.keys().copied().collect();
        for id in ids {
            self.deliver(id, frame.clone());
        }
    }

    fn deliver(&mut self, id: PlayerId, frame: Frame) {
        let Some(tx) = self.clients.get(&id) else {
            return;
        };
        let len = frame.len();
        match tx.try_send(frame) {
            Ok(()) => self.metrics.record_sent(len),
            Err(TrySendError::Full(_)) => self.metrics.record_dropped(),
            Err(TrySendError::Closed(_)) => {
                debug!(room = %self.room.id(), player = %id, "client queue closed");
                self.drop_client(id);
            }
        }
    }

    fn update_population(&mut self) {
        let now = (self.room.human_count(), self.room.bot_count());
        if now != self.population {
            self.metrics.adjust_population(
                (self.population.0, now.0),
                (self.population.1, now.1),
            );
            self.population = now;
        }
        self.stats.bots.store(now.1, Ordering::Relaxed);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "code 7");
    }

    #[test]
    fn test_release_saturates() {
        let stats = RoomStats::default();
        stats.release();
        assert_eq!(stats.connected.load(Ordering::Acquire), 0);
        stats.connected.store(2, Ordering::Release);
        stats.release();
        assert_eq!(stats.connected.load(Ordering::Acquire), 1);
    }
}
