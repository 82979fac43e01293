use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use respawn_client::board::Board;
use respawn_client::watch::{run_watch, WatchOptions};
use respawn_client::RespawnClient;
use respawn_tracker::config::TrackerConfig;
use respawn_tracker::{Roster, SnapshotStore, Timestamp};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "respawn-client")]
#[command(about = "Watch and update boss respawn timers")]
struct Cli {
    /// Path to respawn.toml
    #[arg(long)]
    config: Option<PathBuf>,
    /// Tracker base URL, overrides the configured one
    #[arg(long)]
    server: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Live board, refetched and redrawn on independent timers
    Watch,
    /// Record a kill for a slot
    Kill {
        key: String,
        /// Kill time; defaults to now
        #[arg(long)]
        at: Option<String>,
    },
    /// Mark a slot active again
    Clear { key: String },
    /// Clear the slot if a kill is recorded, otherwise record one now
    Toggle { key: String },
    /// Clear every slot of a channel
    Reset { channel: String },
    /// Print the board once
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "respawn_client=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = TrackerConfig::resolve(cli.config.as_deref())?;
    let server_url = cli
        .server
        .unwrap_or_else(|| config.client.server_url.clone());
    let client = Arc::new(RespawnClient::new(
        server_url,
        Duration::from_millis(config.client.request_timeout_ms),
    )?);

    match cli.command {
        Command::Watch => {
            let roster = fetch_roster(&client, &config.roster).await;
            let cache = SnapshotStore::new(config.client.cache_path.clone());
            let cached = cache.load(&roster).snapshot;
            info!(
                path = %cache.path().display(),
                killed = cached.killed_count(),
                "Loaded offline cache"
            );

            let options = WatchOptions {
                fetch_interval: Duration::from_millis(config.client.fetch_interval_ms),
                render_interval: Duration::from_millis(config.client.render_interval_ms),
                cache: Some(cache),
                clear_screen: true,
            };
            let mut stdout = std::io::stdout();
            run_watch(
                client,
                Board::new(roster, cached),
                options,
                &mut stdout,
                shutdown_signal(),
            )
            .await?;
        }
        Command::Kill { key, at } => {
            let timestamp = match at {
                Some(raw) => raw,
                None => Timestamp::now().as_str().to_string(),
            };
            let response = client
                .update_slot(&key, Some(&timestamp))
                .await
                .with_context(|| format!("Failed to record kill for {}", key))?;
            println!("{}: {} killed at {}", response.message, key, timestamp);
        }
        Command::Clear { key } => {
            let response = client
                .update_slot(&key, None)
                .await
                .with_context(|| format!("Failed to clear {}", key))?;
            println!("{}: {} cleared", response.message, key);
        }
        Command::Toggle { key } => {
            let response = client
                .toggle(&key, Utc::now())
                .await
                .with_context(|| format!("Failed to toggle {}", key))?;
            let state = match response.current_state.get(&key).and_then(|s| s.killed_at()) {
                Some(ts) => format!("killed at {}", ts),
                None => "cleared".to_string(),
            };
            println!("{}: {} {}", response.message, key, state);
        }
        Command::Reset { channel } => {
            let response = client
                .reset_channel(&channel)
                .await
                .with_context(|| format!("Failed to reset channel {}", channel))?;
            println!(
                "{} ({} bosses)",
                response.message, response.reseted_bosses_count
            );
        }
        Command::Status => {
            let roster = fetch_roster(&client, &config.roster).await;
            let snapshot = client
                .get_state()
                .await
                .context("Failed to fetch state")?;
            let mut board = Board::new(roster, snapshot.clone());
            board.apply_fetch(Ok(snapshot));
            print!("{}", board.render(Utc::now()));
        }
    }

    Ok(())
}

/// Roster as served by the tracker, falling back to the local configuration
async fn fetch_roster(client: &RespawnClient, configured: &Roster) -> Roster {
    match client.roster().await {
        Ok(roster) => roster,
        Err(e) => {
            warn!(error = %e, "Could not fetch roster, using configured roster");
            configured.clone()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl_c signal");
        std::future::pending::<()>().await;
    }
}
