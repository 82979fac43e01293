use anyhow::{Context, Result};
use clap::Parser;
use respawn_tracker::api::create_router;
use respawn_tracker::config::TrackerConfig;
use respawn_tracker::{RespawnService, SnapshotStore};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Parser)]
#[command(name = "respawn-tracker")]
#[command(about = "Shared boss respawn timer server")]
struct Cli {
    /// Path to respawn.toml; defaults to RESPAWN_CONFIG, then ./respawn.toml
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "respawn_tracker=info".into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Respawn tracker starting...");

    let config = TrackerConfig::resolve(cli.config.as_deref())?;

    info!(
        host = %config.server.host,
        port = config.server.port,
        state_file = %config.store.path.display(),
        durability = %config.store.durability,
        channels = config.roster.channels.len(),
        bosses = config.roster.bosses.len(),
        "Configuration loaded"
    );

    let store = SnapshotStore::new(config.store.path.clone());
    let service = Arc::new(RespawnService::open(
        config.roster.clone(),
        store,
        config.store.durability,
    ));

    let router = create_router(service).layer(CorsLayer::permissive());
    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .context("Failed to bind tracker API port")?;
    info!(port = config.server.port, "Tracker API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Tracker API server error")?;

    info!("Respawn tracker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl_c signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
