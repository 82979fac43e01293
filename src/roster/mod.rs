use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::slot::KEY_DELIMITER;

/// A boss and its fixed respawn duration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BossDefinition {
    pub name: String,
    pub respawn_minutes: u32,
}

impl BossDefinition {
    pub fn new(name: impl Into<String>, respawn_minutes: u32) -> Self {
        Self {
            name: name.into(),
            respawn_minutes,
        }
    }
}

/// Deployment roster: ordered bosses and the fixed channel set.
///
/// Boss order only matters for display. Every (channel × boss) pair is one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default = "default_bosses")]
    pub bosses: Vec<BossDefinition>,
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
}

fn default_bosses() -> Vec<BossDefinition> {
    vec![
        BossDefinition::new("Szeptotruj #1", 40),
        BossDefinition::new("Skorpion #1", 40),
        BossDefinition::new("Serpentor #1", 41),
        BossDefinition::new("Szeptotruj #2", 40),
        BossDefinition::new("Skorpion #2", 40),
        BossDefinition::new("Serpentor #2", 41),
    ]
}

fn default_channels() -> Vec<String> {
    (1..=6).map(|n| format!("CH{}", n)).collect()
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            bosses: default_bosses(),
            channels: default_channels(),
        }
    }
}

/// Roster configuration errors, raised once at startup
#[derive(Debug, Clone, PartialEq)]
pub enum RosterError {
    NoBosses,
    NoChannels,
    EmptyBossName,
    DuplicateBoss(String),
    ZeroRespawn(String),
    EmptyChannel,
    DuplicateChannel(String),
    ChannelContainsDelimiter(String),
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterError::NoBosses => write!(f, "roster must define at least one boss"),
            RosterError::NoChannels => write!(f, "roster must define at least one channel"),
            RosterError::EmptyBossName => write!(f, "boss name must not be empty"),
            RosterError::DuplicateBoss(name) => write!(f, "duplicate boss '{}'", name),
            RosterError::ZeroRespawn(name) => {
                write!(f, "boss '{}' must have a positive respawn duration", name)
            }
            RosterError::EmptyChannel => write!(f, "channel identifier must not be empty"),
            RosterError::DuplicateChannel(ch) => write!(f, "duplicate channel '{}'", ch),
            RosterError::ChannelContainsDelimiter(ch) => write!(
                f,
                "channel '{}' must not contain the slot key delimiter '{}'",
                ch, KEY_DELIMITER
            ),
        }
    }
}

impl std::error::Error for RosterError {}

impl Roster {
    pub fn new(bosses: Vec<BossDefinition>, channels: Vec<String>) -> Result<Self, RosterError> {
        let roster = Self { bosses, channels };
        roster.validate()?;
        Ok(roster)
    }

    /// Checks the invariants slot keys rely on.
    ///
    /// Channels may not contain the delimiter since keys split on its first occurrence;
    /// boss names may.
    pub fn validate(&self) -> Result<(), RosterError> {
        if self.bosses.is_empty() {
            return Err(RosterError::NoBosses);
        }
        if self.channels.is_empty() {
            return Err(RosterError::NoChannels);
        }

        let mut seen = HashSet::new();
        for boss in &self.bosses {
            if boss.name.is_empty() {
                return Err(RosterError::EmptyBossName);
            }
            if !seen.insert(boss.name.as_str()) {
                return Err(RosterError::DuplicateBoss(boss.name.clone()));
            }
            if boss.respawn_minutes == 0 {
                return Err(RosterError::ZeroRespawn(boss.name.clone()));
            }
        }

        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.is_empty() {
                return Err(RosterError::EmptyChannel);
            }
            if channel.contains(KEY_DELIMITER) {
                return Err(RosterError::ChannelContainsDelimiter(channel.clone()));
            }
            if !seen.insert(channel.as_str()) {
                return Err(RosterError::DuplicateChannel(channel.clone()));
            }
        }

        Ok(())
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.iter().any(|c| c == channel)
    }

    pub fn boss(&self, name: &str) -> Option<&BossDefinition> {
        self.bosses.iter().find(|b| b.name == name)
    }

    /// Respawn duration for a boss, if it is part of the roster
    pub fn respawn_minutes(&self, boss: &str) -> Option<u32> {
        self.boss(boss).map(|b| b.respawn_minutes)
    }

    /// Number of slots a full snapshot holds
    pub fn slot_count(&self) -> usize {
        self.bosses.len() * self.channels.len()
    }
}
