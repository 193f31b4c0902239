//! Probe: run one refresh cycle against the stats API.
//!
//! Fetches the configured window (falling back to lifetime stats on an
//! invalid-date rejection), prints the raw payload size and entry count, then
//! the snapshot exactly as `/data` would serve it.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use wager_leaderboard::api::StatsClient;
use wager_leaderboard::config::{AppConfig, CONFIG_PATH};
use wager_leaderboard::engine;
use wager_leaderboard::reporter;
use wager_leaderboard::types::Snapshot;

#[derive(Parser)]
#[command(name = "probe_stats", about = "Fetch and rank stats once")]
struct Args {
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Also dump the raw upstream payload
    #[arg(long)]
    raw: bool,

    /// Print the snapshot as a single JSON line
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;
    let client = StatsClient::new(&config.upstream)?;

    println!("=== Probe: stats refresh ===");
    println!("Window: {} .. {}", config.upstream.window_start, client.window_end_now());
    println!();

    let start = Instant::now();
    let snapshot = match client.fetch_latest().await {
        Ok(payload) => {
            println!("Latency: {:?}", start.elapsed());
            match payload.as_array() {
                Some(arr) => println!("Entries in payload: {}", arr.len()),
                None => println!("Payload is not an array"),
            }
            if args.raw {
                println!("{}", serde_json::to_string_pretty(&payload)?);
            }
            engine::transform(&payload, &config.leaderboard)
        }
        Err(e) => {
            println!("Fetch failed after {:?}: {e}", start.elapsed());
            Snapshot::error(e.to_string())
        }
    };
    println!();

    if args.compact {
        reporter::report_snapshot(&snapshot);
    } else {
        reporter::report_snapshot_pretty(&snapshot);
    }
    Ok(())
}
