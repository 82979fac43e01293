use crate::roster::Roster;
use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;


/// Separates channel from boss name in a serialized slot key
pub const KEY_DELIMITER: char = '_';

/// Extended form every accepted input is rewritten to before parsing
const CANONICAL_NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A (channel, boss) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub channel: String,
    pub boss: String,
}

impl SlotKey {
    pub fn new(channel: impl Into<String>, boss: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            boss: boss.into(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.channel, KEY_DELIMITER, self.boss)
    }
}

/// Slot key validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidKey {
    MissingDelimiter(String),
    UnknownChannel { key: String, channel: String },
    UnknownBoss { key: String, boss: String },
}

impl InvalidKey {
    pub fn key(&self) -> &str {
        match self {
            InvalidKey::MissingDelimiter(key) => key,
            InvalidKey::UnknownChannel { key, .. } => key,
            InvalidKey::UnknownBoss { key, .. } => key,
        }
    }
}

impl fmt::Display for InvalidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidKey::MissingDelimiter(key) => write!(
                f,
                "slot key '{}' must have the form <channel>{}<boss>",
                key, KEY_DELIMITER
            ),
            InvalidKey::UnknownChannel { key, channel } => {
                write!(f, "slot key '{}' names unknown channel '{}'", key, channel)
            }
            InvalidKey::UnknownBoss { key, boss } => {
                write!(f, "slot key '{}' names unknown boss '{}'", key, boss)
            }
        }
    }
}

impl std::error::Error for InvalidKey {}

/// Timestamp that is not an ISO-8601 date-time
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidTimestamp(pub String);

impl fmt::Display for InvalidTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not an ISO-8601 date-time", self.0)
    }
}

impl std::error::Error for InvalidTimestamp {}

/// Validates a serialized slot key against the roster.
///
/// Splits on the first delimiter only, so boss names containing it stay intact:
/// `"CH1_Queen_of_Sand"` is channel `CH1`, boss `Queen_of_Sand`.
pub fn validate_key(key: &str, roster: &Roster) -> Result<SlotKey, InvalidKey> {
    let (channel, boss) = key
        .split_once(KEY_DELIMITER)
        .ok_or_else(|| InvalidKey::MissingDelimiter(key.to_string()))?;

    if !roster.has_channel(channel) {
        return Err(InvalidKey::UnknownChannel {
            key: key.to_string(),
            channel: channel.to_string(),
        });
    }
    if roster.boss(boss).is_none() {
        return Err(InvalidKey::UnknownBoss {
            key: key.to_string(),
            boss: boss.to_string(),
        });
    }

    Ok(SlotKey::new(channel, boss))
}

/// Parses an ISO-8601 date-time
pub fn validate_timestamp(raw: &str) -> Result<Timestamp, InvalidTimestamp> {
    Timestamp::parse(raw)
}

/// A kill time as written by a client.
///
/// The client-supplied string is kept verbatim so reads return exactly what was written.
/// Values without an offset are wall-clock times of whoever recorded them and are read
/// in the local zone; `instant_in` picks the zone explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    raw: String,
    time: KillTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KillTime {
    Aware(DateTime<Utc>),
    Naive(NaiveDateTime),
}

impl Timestamp {
    pub fn parse(raw: &str) -> Result<Self, InvalidTimestamp> {
        let time = parse_kill_time(raw).ok_or_else(|| InvalidTimestamp(raw.to_string()))?;
        Ok(Self {
            raw: raw.to_string(),
            time,
        })
    }

    /// Timestamp for a known instant, rendered as RFC 3339 in UTC
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self {
            raw: instant.to_rfc3339_opts(SecondsFormat::Millis, true),
            time: KillTime::Aware(instant),
        }
    }

    pub fn now() -> Self {
        Self::from_instant(Utc::now())
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the raw value carries no UTC offset
    pub fn is_naive(&self) -> bool {
        matches!(self.time, KillTime::Naive(_))
    }

    /// Instant of the kill, reading offset-less values in the local zone
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant_in(&Local)
    }

    /// Instant of the kill, reading offset-less values in `zone`.
    ///
    /// Ambiguous wall-clock times take the earlier instant; times skipped by a
    /// forward clock change fall back to UTC.
    pub fn instant_in<Tz: TimeZone>(&self, zone: &Tz) -> DateTime<Utc> {
        match self.time {
            KillTime::Aware(instant) => instant,
            KillTime::Naive(naive) => zone
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| naive.and_utc()),
        }
    }
}

fn parse_kill_time(raw: &str) -> Option<KillTime> {
    let (canonical, has_offset) = canonicalize(raw)?;
    if has_offset {
        DateTime::parse_from_rfc3339(&canonical)
            .ok()
            .map(|dt| KillTime::Aware(dt.with_timezone(&Utc)))
    } else {
        NaiveDateTime::parse_from_str(&canonical, CANONICAL_NAIVE_FORMAT)
            .ok()
            .map(KillTime::Naive)
    }
}

/// Rewrites an ISO-8601 date-time into `YYYY-MM-DDTHH:MM:SS[.f][+hh:mm]`.
///
/// Accepts basic (`20260510T200000Z`) and extended dates and times, reduced time
/// precision (`T20`, `T20:00`), a bare date (midnight), `.` or `,` fractions on
/// seconds, `T`/`t`/space separators and `Z`, `+hh`, `+hhmm` or `+hh:mm` offsets.
/// Field ranges are left to chrono.
fn canonicalize(raw: &str) -> Option<(String, bool)> {
    let (date, rest) = if raw.get(4..5) == Some("-") {
        (raw.get(..10)?.to_string(), raw.get(10..)?)
    } else {
        let basic = raw.get(..8)?;
        if !basic.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        (
            format!("{}-{}-{}", &basic[..4], &basic[4..6], &basic[6..]),
            raw.get(8..)?,
        )
    };

    let mut chars = rest.chars();
    let time = match chars.next() {
        None => return Some((format!("{}T00:00:00", date), false)),
        Some('T' | 't' | ' ') => chars.as_str(),
        Some(_) => return None,
    };

    let (clock, offset) = split_offset(time)?;
    let clock = canonical_clock(clock)?;
    let has_offset = offset.is_some();
    Some((
        format!("{}T{}{}", date, clock, offset.unwrap_or_default()),
        has_offset,
    ))
}

fn split_offset(time: &str) -> Option<(&str, Option<String>)> {
    if let Some(clock) = time.strip_suffix('Z').or_else(|| time.strip_suffix('z')) {
        return Some((clock, Some("+00:00".to_string())));
    }

    let Some(at) = time.rfind(|c| c == '+' || c == '-') else {
        return Some((time, None));
    };
    let (clock, offset) = time.split_at(at);
    let (sign, digits) = offset.split_at(1);
    if !digits.is_ascii() {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits, "00"),
        4 => (&digits[..2], &digits[2..]),
        5 if &digits[2..3] == ":" => (&digits[..2], &digits[3..]),
        _ => return None,
    };
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((clock, Some(format!("{}{}:{}", sign, hours, minutes))))
}

fn canonical_clock(clock: &str) -> Option<String> {
    let clock = clock.replace(',', ".");
    let (hms, fraction) = match clock.split_once('.') {
        Some((hms, fraction)) => (hms, Some(fraction)),
        None => (clock.as_str(), None),
    };
    if !hms.is_ascii() {
        return None;
    }

    let parts: Vec<&str> = if hms.contains(':') {
        hms.split(':').collect()
    } else if hms.len() % 2 == 0 {
        (0..hms.len()).step_by(2).map(|i| &hms[i..i + 2]).collect()
    } else {
        return None;
    };
    if parts.is_empty()
        || parts.len() > 3
        || parts
            .iter()
            .any(|p| p.len() != 2 || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let mut out = parts.join(":");
    for _ in parts.len()..3 {
        out.push_str(":00");
    }
    if let Some(fraction) = fraction {
        // Fractions only on whole seconds
        if parts.len() != 3
            || fraction.is_empty()
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        out.push('.');
        out.push_str(fraction);
    }
    Some(out)
}

impl FromStr for Timestamp {
    type Err = InvalidTimestamp;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Persisted state of one slot.
///
/// `Unset` covers both "never recorded" and "reset to active"; both serialize as null.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Unset,
    KilledAt(Timestamp),
}

impl SlotState {
    pub fn killed_at(&self) -> Option<&Timestamp> {
        match self {
            SlotState::Unset => None,
            SlotState::KilledAt(ts) => Some(ts),
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, SlotState::Unset)
    }
}

impl From<Option<Timestamp>> for SlotState {
    fn from(value: Option<Timestamp>) -> Self {
        match value {
            Some(ts) => SlotState::KilledAt(ts),
            None => SlotState::Unset,
        }
    }
}

impl Serialize for SlotState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SlotState::Unset => serializer.serialize_none(),
            SlotState::KilledAt(ts) => serializer.serialize_some(ts),
        }
    }
}

impl<'de> Deserialize<'de> for SlotState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<Timestamp>::deserialize(deserializer).map(SlotState::from)
    }
}
