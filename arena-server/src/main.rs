use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use arena_server::accounts::InMemoryAccounts;
use arena_server::leaderboard::{InMemoryLeaderboard, LeaderboardStore};
use arena_server::logging::init_tracing;
use arena_server::metrics::RoomMetrics;
use arena_server::{RoomManager, ServerConfig};

const METRICS_LOG_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("loading server config")?;
    init_tracing(&config.tracing);

    info!(
        tick_rate = config.sim.tick_rate,
        broadcast_rate = config.sim.broadcast_rate,
        max_players = config.max_players_per_room,
        wire = ?config.wire_format,
        "starting arena server"
    );

    let leaderboard = Arc::new(InMemoryLeaderboard::new());
    let metrics = RoomMetrics::new();
    let manager = Arc::new(RoomManager::new(
        config,
        leaderboard.clone(),
        Arc::new(InMemoryAccounts::new()),
        metrics.clone(),
    ));

    let headless = manager.start_headless();
    info!(rooms = ?headless, "headless rooms running");
    let reaper = manager.spawn_reaper();

    let reporter = {
        let metrics = metrics.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(METRICS_LOG_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                let s = metrics.snapshot();
                info!(
                    rooms = s.rooms,
                    players = s.players,
                    bots = s.bots,
                    ticks = s.ticks,
                    avg_tick_ms = s.avg_tick_ms,
                    overruns = s.overruns,
                    dropped = s.dropped_messages,
                    "metrics"
                );
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("shutdown requested");

    reporter.abort();
    reaper.abort();
    manager.shutdown().await;

    let top = leaderboard.top(10).await?;
    info!(entries = top.len(), "final leaderboard");
    for (rank, e) in top.iter().enumerate() {
        info!(rank = rank + 1, name = %e.name, score = e.score, level = e.level, "leaderboard");
    }
    print!("{}", metrics.render_prometheus());
    Ok(())
}
