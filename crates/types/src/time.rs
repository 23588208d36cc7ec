//! Minute-precision timestamps in the `yyyy-MM-dd HH:mm` wire format.
//!
//! Check-in and check-out times travel through requests, responses and the
//! record snapshot in one fixed textual form. Seconds are never carried: a
//! value built from a clock reading is truncated to the minute so that what is
//! stored is exactly what a caller can send back.

use chrono::{DurationRound, Local, NaiveDateTime, TimeDelta};
use std::fmt;
use std::str::FromStr;

/// `chrono` format string for `yyyy-MM-dd HH:mm`.
pub const CHECKPOINT_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimeError {
    #[error("timestamp '{0}' does not match the format yyyy-MM-dd HH:mm")]
    Format(String),
}

/// A local date-time truncated to the minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CheckpointTime(NaiveDateTime);

impl CheckpointTime {
    /// Parses `yyyy-MM-dd HH:mm`. Surrounding whitespace is ignored; seconds are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::Format`] carrying the offending input.
    pub fn parse(input: &str) -> Result<Self, TimeError> {
        NaiveDateTime::parse_from_str(input.trim(), CHECKPOINT_FORMAT)
            .map(Self)
            .map_err(|_| TimeError::Format(input.to_owned()))
    }

    /// The current local time, truncated to the minute.
    pub fn now() -> Self {
        Self::from_naive(Local::now().naive_local())
    }

    pub fn from_naive(value: NaiveDateTime) -> Self {
        let truncated = value
            .duration_trunc(TimeDelta::minutes(1))
            .unwrap_or(value);
        Self(truncated)
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for CheckpointTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CHECKPOINT_FORMAT))
    }
}

impl FromStr for CheckpointTime {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CheckpointTime {
    type Error = TimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CheckpointTime> for String {
    fn from(value: CheckpointTime) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn test_parse_and_display_use_the_same_format() {
        let t = CheckpointTime::parse("2024-03-01 09:30").expect("parse should succeed");
        assert_eq!(t.to_string(), "2024-03-01 09:30");
    }

    #[test]
    fn test_parse_rejects_seconds_and_other_layouts() {
        for bad in ["2024-03-01 09:30:15", "01/03/2024 09:30", "2024-03-01", "", "now"] {
            assert_eq!(
                CheckpointTime::parse(bad),
                Err(TimeError::Format(bad.to_string())),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_from_naive_truncates_to_minute() {
        let raw = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_milli_opt(9, 30, 59, 999))
            .expect("valid date");
        let t = CheckpointTime::from_naive(raw);
        assert_eq!(t.naive().second(), 0);
        assert_eq!(t.naive().nanosecond(), 0);
        assert_eq!(t.to_string(), "2024-03-01 09:30");
    }

    #[test]
    fn test_now_has_no_seconds() {
        let now = CheckpointTime::now();
        assert_eq!(now.naive().second(), 0);
    }

    #[test]
    fn test_ordering_follows_time() {
        let a = CheckpointTime::parse("2024-03-01 09:30").expect("parse should succeed");
        let b = CheckpointTime::parse("2024-03-01 10:00").expect("parse should succeed");
        assert!(a < b);
    }
}
