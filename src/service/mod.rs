use crate::config::Durability;
use crate::roster::Roster;
use crate::slot::{validate_key, validate_timestamp, InvalidKey, InvalidTimestamp, SlotKey, SlotState};
use crate::status::{derive_status, Status};
use crate::store::{Snapshot, SnapshotStore};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

#[cfg(test)]
mod tests;

/// Errors from `update_slot`
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateError {
    UnknownKey(InvalidKey),
    InvalidTimestamp(InvalidTimestamp),
    /// Strict durability only: the write was rolled back
    Persistence(String),
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateError::UnknownKey(e) => write!(f, "{}", e),
            UpdateError::InvalidTimestamp(e) => write!(f, "{}", e),
            UpdateError::Persistence(msg) => write!(f, "failed to persist state: {}", msg),
        }
    }
}

impl std::error::Error for UpdateError {}

/// Errors from `reset_channel`
#[derive(Debug, Clone, PartialEq)]
pub enum ResetError {
    UnknownChannel(String),
    /// Strict durability only: the reset was rolled back
    Persistence(String),
}

impl fmt::Display for ResetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetError::UnknownChannel(ch) => write!(f, "unknown channel '{}'", ch),
            ResetError::Persistence(msg) => write!(f, "failed to persist state: {}", msg),
        }
    }
}

impl std::error::Error for ResetError {}

/// Authoritative respawn state shared by all clients.
///
/// Writers hold the write guard across validate-mutate-persist-return, so concurrent
/// writes are serialized in arrival order and readers only ever see whole snapshots.
pub struct RespawnService {
    roster: Roster,
    store: SnapshotStore,
    durability: Durability,
    snapshot: RwLock<Snapshot>,
}

impl RespawnService {
    /// Load state from the store, persisting it right away if it had to be
    /// initialized or repaired.
    pub fn open(roster: Roster, store: SnapshotStore, durability: Durability) -> Self {
        let loaded = store.load(&roster);

        if loaded.origin.needs_persist() {
            info!(origin = ?loaded.origin, "Persisting startup state");
            if let Err(e) = store.save(&loaded.snapshot) {
                error!(
                    error = %e,
                    path = %store.path().display(),
                    "Failed to persist startup state"
                );
            }
        }

        Self::with_snapshot(roster, store, durability, loaded.snapshot)
    }

    pub fn with_snapshot(
        roster: Roster,
        store: SnapshotStore,
        durability: Durability,
        snapshot: Snapshot,
    ) -> Self {
        Self {
            roster,
            store,
            durability,
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn durability(&self) -> Durability {
        self.durability
    }

    /// Current snapshot
    pub async fn get_state(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Marks a slot killed at `timestamp`, or unset when `timestamp` is `None`.
    ///
    /// Repeating the same call yields the same state.
    pub async fn update_slot(
        &self,
        key: &str,
        timestamp: Option<&str>,
    ) -> Result<Snapshot, UpdateError> {
        let slot = validate_key(key, &self.roster).map_err(|e| {
            warn!(key = %key, error = %e, "Rejected update for unknown slot");
            UpdateError::UnknownKey(e)
        })?;

        let state = match timestamp {
            None => SlotState::Unset,
            Some(raw) => {
                let ts = validate_timestamp(raw).map_err(|e| {
                    warn!(key = %key, error = %e, "Rejected update with invalid timestamp");
                    UpdateError::InvalidTimestamp(e)
                })?;
                SlotState::KilledAt(ts)
            }
        };

        let mut snapshot = self.snapshot.write().await;
        let previous = snapshot.set(&slot, state.clone()).unwrap_or_default();

        if let Err(msg) = self.persist(&snapshot) {
            if self.durability == Durability::Strict {
                snapshot.set(&slot, previous);
                return Err(UpdateError::Persistence(msg));
            }
        }

        match state.killed_at() {
            Some(ts) => info!(key = %slot, killed_at = %ts, "Boss marked killed"),
            None => info!(key = %slot, "Boss marked active"),
        }

        Ok(snapshot.clone())
    }

    /// Sets every slot of `channel` to unset in one persisted write.
    ///
    /// Returns the number of slots reset, always the number of configured bosses.
    pub async fn reset_channel(&self, channel: &str) -> Result<(usize, Snapshot), ResetError> {
        if !self.roster.has_channel(channel) {
            warn!(channel = %channel, "Rejected reset for unknown channel");
            return Err(ResetError::UnknownChannel(channel.to_string()));
        }

        let mut snapshot = self.snapshot.write().await;
        let before = snapshot.clone();

        let mut count = 0;
        for boss in &self.roster.bosses {
            snapshot.set(&SlotKey::new(channel, boss.name.as_str()), SlotState::Unset);
            count += 1;
        }

        if let Err(msg) = self.persist(&snapshot) {
            if self.durability == Durability::Strict {
                *snapshot = before;
                return Err(ResetError::Persistence(msg));
            }
        }

        info!(channel = %channel, count = count, "Channel reset");

        Ok((count, snapshot.clone()))
    }

    /// Derived status of every slot at `now`
    pub async fn statuses(&self, now: DateTime<Utc>) -> BTreeMap<String, Status> {
        let snapshot = self.snapshot.read().await;
        snapshot_statuses(&snapshot, &self.roster, now)
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), String> {
        self.store.save(snapshot).map_err(|e| {
            error!(
                error = %format!("{:#}", e),
                path = %self.store.path().display(),
                durability = ?self.durability,
                "Failed to persist state"
            );
            format!("{:#}", e)
        })
    }
}

/// Derives the status of every slot in `snapshot`.
///
/// Slots whose boss is not in the roster are skipped.
pub fn snapshot_statuses(
    snapshot: &Snapshot,
    roster: &Roster,
    now: DateTime<Utc>,
) -> BTreeMap<String, Status> {
    snapshot
        .iter()
        .filter_map(|(key, state)| {
            let slot = validate_key(key, roster).ok()?;
            let minutes = roster.respawn_minutes(&slot.boss)?;
            Some((key.clone(), derive_status(state, minutes, now)))
        })
        .collect()
}
