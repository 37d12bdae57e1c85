use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Structured `(date, time)` identity of a bookable slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl SlotKey {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }

    pub fn date_str(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    pub fn time_str(&self) -> String {
        self.time.format(TIME_FORMAT).to_string()
    }

    /// The instant the slot begins, interpreting its wall-clock fields in `zone`.
    pub fn starts_at(&self, zone: FixedOffset) -> DateTime<FixedOffset> {
        let local = self.date.and_time(self.time);
        DateTime::from_naive_utc_and_offset(local - zone, zone)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date_str(), self.time_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub key: SlotKey,
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
}

/// Accepts only the zero-padded `YYYY-MM-DD` form.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let bytes = value.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(idx, byte)| idx == 4 || idx == 7 || byte.is_ascii_digit());
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

/// Accepts `HH:MM` and `H:MM`.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    let (hours, minutes) = value.split_once(':')?;
    let shaped = (1..=2).contains(&hours.len())
        && minutes.len() == 2
        && hours.chars().chain(minutes.chars()).all(|ch| ch.is_ascii_digit());
    if !shaped {
        return None;
    }
    NaiveTime::from_hms_opt(hours.parse().ok()?, minutes.parse().ok()?, 0)
}
