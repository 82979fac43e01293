//! Last known snapshot plus its text rendering.

use crate::client::ClientError;
use chrono::{DateTime, Utc};
use respawn_tracker::slot::{SlotKey, SlotState};
use respawn_tracker::{derive_status, Roster, Snapshot, Status};
use std::fmt;
use std::fmt::Write as _;

/// Outcome of the most recent fetch, shown under the board
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connecting,
    Updated,
    Unchanged,
    Failed(ClientError),
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "Status: connecting to server..."),
            ConnectionStatus::Updated => write!(f, "Status: connected (data updated)"),
            ConnectionStatus::Unchanged => write!(f, "Status: connected (no new data)"),
            ConnectionStatus::Failed(e) => write!(f, "Status: {}. Retrying...", e),
        }
    }
}

/// Client-side view: what the user sees between fetches
#[derive(Debug, Clone)]
pub struct Board {
    roster: Roster,
    snapshot: Snapshot,
    connection: ConnectionStatus,
}

impl Board {
    pub fn new(roster: Roster, snapshot: Snapshot) -> Self {
        Self {
            roster,
            snapshot,
            connection: ConnectionStatus::Connecting,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn connection(&self) -> &ConnectionStatus {
        &self.connection
    }

    /// Apply a fetch result. Failures keep the last snapshot.
    ///
    /// Returns true when the snapshot changed.
    pub fn apply_fetch(&mut self, result: Result<Snapshot, ClientError>) -> bool {
        match result {
            Ok(snapshot) if snapshot != self.snapshot => {
                self.snapshot = snapshot;
                self.connection = ConnectionStatus::Updated;
                true
            }
            Ok(_) => {
                self.connection = ConnectionStatus::Unchanged;
                false
            }
            Err(e) => {
                self.connection = ConnectionStatus::Failed(e);
                false
            }
        }
    }

    /// Status of one slot at `now`; slots missing from the snapshot count as unset
    pub fn status(&self, channel: &str, boss: &str, now: DateTime<Utc>) -> Option<Status> {
        let minutes = self.roster.respawn_minutes(boss)?;
        let key = SlotKey::new(channel, boss).to_string();
        let state = self.snapshot.get(&key).cloned().unwrap_or(SlotState::Unset);
        Some(derive_status(&state, minutes, now))
    }

    /// Render the board as a channel × boss table
    pub fn render(&self, now: DateTime<Utc>) -> String {
        let channel_width = self
            .roster
            .channels
            .iter()
            .map(|c| c.chars().count())
            .max()
            .unwrap_or(0);
        let widths: Vec<usize> = self
            .roster
            .bosses
            .iter()
            .map(|b| b.name.chars().count().max(8))
            .collect();

        let mut out = String::new();

        let _ = write!(out, "{:channel_width$}", "");
        for (boss, width) in self.roster.bosses.iter().zip(widths.iter().copied()) {
            let _ = write!(out, " | {:<width$}", boss.name);
        }
        out.push('\n');

        for channel in &self.roster.channels {
            let _ = write!(out, "{:<channel_width$}", channel);
            for (boss, width) in self.roster.bosses.iter().zip(widths.iter().copied()) {
                let cell = self
                    .status(channel, &boss.name, now)
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                let _ = write!(out, " | {:<width$}", cell);
            }
            out.push('\n');
        }

        out.push('\n');
        out.push_str(&self.connection.to_string());
        out.push('\n');
        out
    }
}
