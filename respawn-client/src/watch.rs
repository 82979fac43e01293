//! Two-timer polling: fetch from the server, redraw locally.

use crate::board::Board;
use crate::client::{ClientError, RespawnClient};
use anyhow::Result;
use chrono::Utc;
use respawn_tracker::{Snapshot, SnapshotStore};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// Latest fetch outcome; `None` until the first fetch completes
pub type FetchResult = Option<Result<Snapshot, ClientError>>;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub fetch_interval: Duration,
    pub render_interval: Duration,
    /// Offline cache refreshed whenever a fetch returns a changed snapshot
    pub cache: Option<SnapshotStore>,
    pub clear_screen: bool,
}

/// Spawn the fetch loop.
///
/// Each tick fetches the full snapshot and publishes the outcome; only the latest
/// result is kept. The loop exits once every receiver is dropped.
pub fn spawn_fetch_loop(
    client: Arc<RespawnClient>,
    fetch_interval: Duration,
    cache: Option<SnapshotStore>,
    initial: Snapshot,
) -> (watch::Receiver<FetchResult>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(None);

    let handle = tokio::spawn(async move {
        let mut timer = interval(fetch_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_good = initial;

        loop {
            timer.tick().await;

            let result = client.get_state().await;
            match &result {
                Ok(snapshot) if *snapshot != last_good => {
                    debug!(slots = snapshot.len(), "Fetched changed snapshot");
                    if let Some(cache) = &cache {
                        if let Err(e) = cache.save(snapshot) {
                            error!(error = %e, path = %cache.path().display(), "Failed to update local cache");
                        }
                    }
                    last_good = snapshot.clone();
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Fetch failed, keeping last snapshot"),
            }

            if tx.send(Some(result)).is_err() {
                break;
            }
        }
    });

    (rx, handle)
}

/// Run the watch loop until `shutdown` resolves.
///
/// Fetching happens in its own task; the render timer only reads the latest
/// published result, so rendering never waits on the network.
pub async fn run_watch<W, F>(
    client: Arc<RespawnClient>,
    mut board: Board,
    options: WatchOptions,
    out: &mut W,
    shutdown: F,
) -> Result<()>
where
    W: Write,
    F: Future<Output = ()>,
{
    info!(
        server = %client.base_url(),
        fetch_ms = options.fetch_interval.as_millis() as u64,
        render_ms = options.render_interval.as_millis() as u64,
        "Watching respawn timers"
    );

    let (mut rx, fetch_task) = spawn_fetch_loop(
        client,
        options.fetch_interval,
        options.cache.clone(),
        board.snapshot().clone(),
    );

    let mut render_timer = interval(options.render_interval);
    render_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = render_timer.tick() => {
                if rx.has_changed().unwrap_or(false) {
                    if let Some(result) = rx.borrow_and_update().clone() {
                        board.apply_fetch(result);
                    }
                }
                if options.clear_screen {
                    out.write_all(CLEAR_SCREEN.as_bytes())?;
                }
                out.write_all(board.render(Utc::now()).as_bytes())?;
                out.flush()?;
            }
            _ = &mut shutdown => break,
        }
    }

    fetch_task.abort();
    Ok(())
}
