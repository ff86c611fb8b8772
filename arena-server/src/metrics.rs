//! Room runtime metrics with Prometheus text export
//!
//! Uses lock-free atomics for all counters. One instance is shared by every
//! room worker; the binary logs a summary and the exposition text is
//! available to whatever transport fronts the server.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RoomMetrics {
    pub ticks: AtomicU64,
    pub tick_errors: AtomicU64,
    /// Ticks that took longer than their period
    pub overruns: AtomicU64,
    /// Cumulative tick time in microseconds
    pub tick_time_us: AtomicU64,
    pub broadcasts: AtomicU64,
    pub bytes_sent: AtomicU64,
    /// Outbound messages dropped on full client queues
    pub dropped_messages: AtomicU64,
    pub players: AtomicU64,
    pub bots: AtomicU64,
    pub rooms: AtomicU64,
    pub start_time: Instant,
}

impl Default for RoomMetrics {
    fn default() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            tick_errors: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            dropped_messages: AtomicU64::new(0),
            players: AtomicU64::new(0),
            bots: AtomicU64::new(0),
            rooms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: f64,
    pub ticks: u64,
    pub tick_errors: u64,
    pub overruns: u64,
    pub avg_tick_ms: f64,
    pub broadcasts: u64,
    pub bytes_sent: u64,
    pub dropped_messages: u64,
    pub players: u64,
    pub bots: u64,
    pub rooms: u64,
}

impl RoomMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_tick(&self, elapsed: Duration, period: Duration, ok: bool) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.tick_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        if elapsed > period {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
        if !ok {
            self.tick_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_broadcast(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Apply a room's population change to the global gauges.
    pub fn adjust_population(&self, players: (usize, usize), bots: (usize, usize)) {
        adjust(&self.players, players.0, players.1);
        adjust(&self.bots, bots.0, bots.1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let ticks = self.ticks.load(Ordering::Relaxed);
        let tick_us = self.tick_time_us.load(Ordering::Relaxed);
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs_f64(),
            ticks,
            tick_errors: self.tick_errors.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            avg_tick_ms: if ticks > 0 {
                tick_us as f64 / ticks as f64 / 1000.0
            } else {
                0.0
            },
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            dropped_messages: self.dropped_messages.load(Ordering::Relaxed),
            players: self.players.load(Ordering::Relaxed),
            bots: self.bots.load(Ordering::Relaxed),
            rooms: self.rooms.load(Ordering::Relaxed),
        }
    }

    /// Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let s = self.snapshot();
        format!(
            "# HELP arena_ticks_total Simulation ticks processed\n\
             # TYPE arena_ticks_total counter\n\
             arena_ticks_total {ticks}\n\
             \n\
             # HELP arena_tick_errors_total Ticks that reported a fault or panicked\n\
             # TYPE arena_tick_errors_total counter\n\
             arena_tick_errors_total {errors}\n\
             \n\
             # HELP arena_tick_overruns_total Ticks longer than the tick period\n\
             # TYPE arena_tick_overruns_total counter\n\
             arena_tick_overruns_total {overruns}\n\
             \n\
             # HELP arena_tick_duration_seconds Average tick duration\n\
             # TYPE arena_tick_duration_seconds gauge\n\
             arena_tick_duration_seconds {avg_tick_s:.6}\n\
             \n\
             # HELP arena_broadcasts_total State broadcasts sent\n\
             # TYPE arena_broadcasts_total counter\n\
             arena_broadcasts_total {broadcasts}\n\
             \n\
             # HELP arena_bytes_sent_total Encoded bytes queued to clients\n\
             # TYPE arena_bytes_sent_total counter\n\
             arena_bytes_sent_total {bytes}\n\
             \n\
             # HELP arena_dropped_messages_total Outbound messages dropped on full queues\n\
             # TYPE arena_dropped_messages_total counter\n\
             arena_dropped_messages_total {dropped}\n\
             \n\
             # HELP arena_players Connected real players\n\
             # TYPE arena_players gauge\n\
             arena_players {players}\n\
             \n\
             # HELP arena_bots Active bots\n\
             # TYPE arena_bots gauge\n\
             arena_bots {bots}\n\
             \n\
             # HELP arena_rooms Running rooms\n\
             # TYPE arena_rooms gauge\n\
             arena_rooms {rooms}\n\
             \n\
             # HELP arena_uptime_seconds Server uptime\n\
             # TYPE arena_uptime_seconds gauge\n\
             arena_uptime_seconds {uptime:.2}\n",
            ticks = s.ticks,
            errors = s.tick_errors,
            overruns = s.overruns,
            avg_tick_s = s.avg_tick_ms / 1000.0,
            broadcasts = s.broadcasts,
            bytes = s.bytes_sent,
            dropped = s.dropped_messages,
            players = s.players,
            bots = s.bots,
            rooms = s.rooms,
            uptime = s.uptime_secs,
        )
    }
}

fn adjust(gauge: &AtomicU64, before: usize, after: usize) {
    if after > before {
        gauge.fetch_add((after - before) as u64, Ordering::Relaxed);
    } else if before > after {
        gauge.fetch_sub((before - after) as u64, Ordering::Relaxed);
    }
}
