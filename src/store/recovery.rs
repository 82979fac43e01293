use crate::roster::Roster;
use crate::slot::{validate_key, validate_timestamp, SlotState};
use crate::store::Snapshot;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// How the startup snapshot was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// File was complete and fully valid
    Restored,
    /// File was usable but entries were dropped or missing slots were filled
    Repaired { dropped: usize, filled: usize },
    /// File absent, unreadable, or with no valid entry: every slot `Unset`
    Initialized,
}

impl LoadOrigin {
    /// Whether memory now differs from what is on disk
    pub fn needs_persist(&self) -> bool {
        !matches!(self, LoadOrigin::Restored)
    }
}

#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub snapshot: Snapshot,
    pub origin: LoadOrigin,
}

/// Load the persisted snapshot, dropping anything that does not validate.
///
/// Never fails: a missing or corrupt file yields the initialized default.
pub fn load_snapshot(path: &Path, roster: &Roster) -> LoadedSnapshot {
    let initialized = || LoadedSnapshot {
        snapshot: Snapshot::initialized(roster),
        origin: LoadOrigin::Initialized,
    };

    if !path.exists() {
        info!(
            path = %path.display(),
            "State file does not exist, initializing default state"
        );
        return initialized();
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read state file, initializing default state");
            return initialized();
        }
    };

    let entries: Map<String, Value> = match serde_json::from_str(&contents) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt state file, initializing default state");
            return initialized();
        }
    };

    let (mut snapshot, dropped) = validate_entries(entries, roster);

    if snapshot.is_empty() {
        info!(
            path = %path.display(),
            dropped = dropped,
            "State file has no valid entries, initializing default state"
        );
        return initialized();
    }

    let mut filled = 0;
    for (key, _) in Snapshot::initialized(roster).iter() {
        if !snapshot.contains_key(key) {
            snapshot.insert_raw(key.clone(), SlotState::Unset);
            filled += 1;
        }
    }

    if filled > 0 {
        warn!(filled = filled, "State file was missing slots, filled as unset");
    }

    let origin = if dropped == 0 && filled == 0 {
        LoadOrigin::Restored
    } else {
        LoadOrigin::Repaired { dropped, filled }
    };

    info!(
        path = %path.display(),
        slots = snapshot.len(),
        killed = snapshot.killed_count(),
        "Loaded state from file"
    );

    LoadedSnapshot { snapshot, origin }
}

/// Keeps entries whose key and value both validate; returns the kept snapshot and
/// the number of dropped entries.
pub fn validate_entries(entries: Map<String, Value>, roster: &Roster) -> (Snapshot, usize) {
    let mut snapshot = Snapshot::default();
    let mut dropped = 0;

    for (key, value) in entries {
        let slot = match validate_key(&key, roster) {
            Ok(slot) => slot,
            Err(e) => {
                warn!(key = %key, error = %e, "Unknown or invalid slot key in state file, ignoring");
                dropped += 1;
                continue;
            }
        };

        let state = match value {
            Value::Null => SlotState::Unset,
            Value::String(raw) => match validate_timestamp(&raw) {
                Ok(ts) => SlotState::KilledAt(ts),
                Err(e) => {
                    warn!(key = %key, error = %e, "Invalid timestamp in state file, ignoring");
                    dropped += 1;
                    continue;
                }
            },
            other => {
                warn!(key = %key, value = %other, "Invalid value in state file, ignoring");
                dropped += 1;
                continue;
            }
        };

        snapshot.set(&slot, state);
    }

    (snapshot, dropped)
}
