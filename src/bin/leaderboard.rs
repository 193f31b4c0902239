use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wager_leaderboard::api::StatsClient;
use wager_leaderboard::config::{AppConfig, CONFIG_PATH};
use wager_leaderboard::scheduler::Scheduler;
use wager_leaderboard::server;
use wager_leaderboard::store::SnapshotStore;

#[derive(Parser)]
#[command(name = "leaderboard", about = "Wager leaderboard refresher and snapshot server")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Override `settings.bind_addr`
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;
    info!("Loaded config from {}", args.config.display());

    let bind_addr = args.bind.unwrap_or_else(|| config.settings.bind_addr.clone());
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    info!(
        "Starting leaderboard: tag={:?} max_entries={} ticket_divisor={} refresh={}s timeout={}s",
        config.leaderboard.campaign_tag,
        config.leaderboard.max_entries,
        config.leaderboard.ticket_divisor,
        config.settings.refresh_interval_secs,
        config.upstream.request_timeout_secs,
    );

    let store = Arc::new(SnapshotStore::new());
    let client = StatsClient::new(&config.upstream).context("failed to build stats client")?;
    let scheduler = Scheduler::new(
        client,
        config.leaderboard.clone(),
        Arc::clone(&store),
        config.settings.refresh_interval(),
    );

    let shutdown = CancellationToken::new();
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));
    let server_handle = tokio::spawn(server::serve(listener, store, shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Shutdown signal received");
    shutdown.cancel();

    if let Err(e) = scheduler_handle.await {
        warn!("Scheduler task ended abnormally: {e}");
    }
    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Server error: {e}"),
        Err(e) => warn!("Server task ended abnormally: {e}"),
    }

    Ok(())
}
