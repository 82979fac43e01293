use crate::roster::Roster;
use crate::slot::{SlotKey, SlotState};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub mod recovery;

pub use recovery::{LoadOrigin, LoadedSnapshot};

#[cfg(test)]
mod tests;

/// State of every slot at one instant, keyed by serialized slot key.
///
/// Serializes as a flat `{slotKey: isoTimestampOrNull}` object, which is both the
/// wire format and the persisted file layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    slots: BTreeMap<String, SlotState>,
}

impl Snapshot {
    /// Every (channel × boss) slot of the roster set to `Unset`
    pub fn initialized(roster: &Roster) -> Self {
        let mut slots = BTreeMap::new();
        for channel in &roster.channels {
            for boss in &roster.bosses {
                slots.insert(
                    SlotKey::new(channel.as_str(), boss.name.as_str()).to_string(),
                    SlotState::Unset,
                );
            }
        }
        Self { slots }
    }

    pub fn get(&self, key: &str) -> Option<&SlotState> {
        self.slots.get(key)
    }

    /// Sets a slot, returning its previous state
    pub fn set(&mut self, key: &SlotKey, state: SlotState) -> Option<SlotState> {
        self.slots.insert(key.to_string(), state)
    }

    pub(crate) fn insert_raw(&mut self, key: String, state: SlotState) {
        self.slots.insert(key, state);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SlotState)> {
        self.slots.iter()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots with a recorded kill
    pub fn killed_count(&self) -> usize {
        self.slots.values().filter(|s| !s.is_unset()).count()
    }
}

/// File-backed persistence for the snapshot
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling temp file: the full file name plus `.tmp`
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Loads and validates the persisted snapshot; never fails
    pub fn load(&self, roster: &Roster) -> LoadedSnapshot {
        recovery::load_snapshot(&self.path, roster)
    }

    /// Save snapshot as pretty-printed JSON.
    ///
    /// Uses atomic write: writes to `<file name>.tmp`, fsyncs, then renames, so readers never
    /// see a partially written file.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .context("Failed to serialize snapshot to JSON")?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create state directory {}", parent.display())
                })?;
            }
        }

        let tmp_path = self.tmp_path();

        {
            let mut tmp_file =
                File::create(&tmp_path).context("Failed to create temporary state file")?;
            tmp_file
                .write_all(json.as_bytes())
                .context("Failed to write state data")?;
            tmp_file
                .sync_all()
                .context("Failed to sync state file to disk")?;
        }

        fs::rename(&tmp_path, &self.path).context("Failed to rename temporary state file")?;

        Ok(())
    }
}
