use crate::slot::SlotState;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use serde::Serialize;
use std::fmt;

/// At or below this many seconds left a respawn counts as "soon"
pub const SOON_THRESHOLD_SECONDS: i64 = 5;

/// Derived lifecycle status of a slot. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    /// Slot is unset: never recorded, or reset. Treated as alive.
    Unknown,
    Active,
    RespawningLater { remaining_seconds: i64 },
    RespawningSoon { remaining_seconds: i64 },
}

impl Status {
    /// True when the boss can be engaged now
    pub fn is_alive(&self) -> bool {
        matches!(self, Status::Unknown | Status::Active)
    }

    pub fn remaining_seconds(&self) -> Option<i64> {
        match self {
            Status::RespawningLater { remaining_seconds }
            | Status::RespawningSoon { remaining_seconds } => Some(*remaining_seconds),
            Status::Unknown | Status::Active => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unknown => write!(f, "Unknown"),
            Status::Active => write!(f, "Active"),
            Status::RespawningLater { remaining_seconds } => {
                write!(f, "{} min", remaining_seconds / 60)
            }
            Status::RespawningSoon { remaining_seconds } => {
                write!(f, "{}:{:02}", remaining_seconds / 60, remaining_seconds % 60)
            }
        }
    }
}

/// Derives the status of a slot at `now`, reading offset-less kill times in the
/// local zone.
pub fn derive_status(state: &SlotState, respawn_minutes: u32, now: DateTime<Utc>) -> Status {
    derive_status_in(state, respawn_minutes, now, &Local)
}

/// Derives the status of a slot at `now`, reading offset-less kill times in `zone`.
///
/// Pure: no I/O, same inputs give the same result. Remaining time is rounded up to
/// whole seconds, so a boss is respawning for as long as any time is left. A kill
/// time after `now` (clock skew) yields more than the full duration, not an error.
pub fn derive_status_in<Tz: TimeZone>(
    state: &SlotState,
    respawn_minutes: u32,
    now: DateTime<Utc>,
    zone: &Tz,
) -> Status {
    let killed_at = match state {
        SlotState::Unset => return Status::Unknown,
        SlotState::KilledAt(ts) => ts.instant_in(zone),
    };

    let respawn_at = match killed_at.checked_add_signed(Duration::minutes(i64::from(respawn_minutes))) {
        Some(at) => at,
        None => {
            return Status::RespawningLater {
                remaining_seconds: i64::MAX,
            }
        }
    };

    let remaining_ms = (respawn_at - now).num_milliseconds();
    if remaining_ms <= 0 {
        return Status::Active;
    }

    let remaining_seconds = (remaining_ms + 999) / 1000;
    if remaining_seconds > SOON_THRESHOLD_SECONDS {
        Status::RespawningLater { remaining_seconds }
    } else {
        Status::RespawningSoon { remaining_seconds }
    }
}
