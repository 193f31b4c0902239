use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::StatsClient;
use crate::config::LeaderboardConfig;
use crate::engine;
use crate::store::SnapshotStore;
use crate::types::Snapshot;

/// Drives fetch → transform → publish on a fixed cadence.
pub struct Scheduler {
    client: StatsClient,
    leaderboard: LeaderboardConfig,
    store: Arc<SnapshotStore>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        client: StatsClient,
        leaderboard: LeaderboardConfig,
        store: Arc<SnapshotStore>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            leaderboard,
            store,
            interval,
        }
    }

    /// Run refresh cycles until `shutdown` is cancelled.
    ///
    /// The first cycle starts immediately. Each following cycle starts
    /// `interval` after the previous one finished, so cycles never overlap.
    /// A failed cycle publishes an error snapshot and the loop carries on.
    /// Cancelling during a cycle abandons it without publishing.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Scheduler started (interval: {}s)",
            self.interval.as_secs_f64()
        );
        let mut cycle: u64 = 0;

        loop {
            cycle += 1;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.run_cycle(cycle) => {}
            }
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Scheduler stopped after {cycle} cycle(s)");
    }

    /// One full cycle: build a snapshot, then publish it.
    pub async fn run_cycle(&self, cycle: u64) {
        let started = Instant::now();
        info!("Refresh cycle #{cycle} starting");

        let snapshot = self.refresh().await;
        match &snapshot {
            Snapshot::Leaderboard(board) => info!(
                "Cycle #{cycle}: published {} entries, {} total tickets ({:?})",
                board.entries.len(),
                board.total_tickets_formatted,
                started.elapsed()
            ),
            Snapshot::Error { message } => {
                error!("Cycle #{cycle} failed: {message} ({:?})", started.elapsed())
            }
        }
        self.store.publish(snapshot);
    }

    /// Fetch and transform without touching the store.
    pub async fn refresh(&self) -> Snapshot {
        match self.client.fetch_latest().await {
            Ok(payload) => engine::transform(&payload, &self.leaderboard),
            Err(e) => Snapshot::error(e.to_string()),
        }
    }
}
