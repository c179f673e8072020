//! Timestamp handling for feed data.
//!
//! The feed reports times as ISO 8601 strings, normally with an offset
//! (e.g. "2024-03-15T10:00:00.000+01:00"). Some bridge responses drop the
//! offset; those are read as UTC. Anything that cannot be parsed is treated
//! as absent rather than as an error, so a single malformed field never
//! takes down a whole announcement.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// An absolute instant. All feed times are normalized to UTC on decode.
pub type Timestamp = DateTime<Utc>;

/// Formats accepted for timestamps without an explicit offset.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Error returned when parsing an invalid timestamp string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Parse a feed timestamp, reporting why it was rejected.
///
/// # Examples
///
/// ```
/// use rail_timeline::domain::parse_timestamp_strict;
///
/// let t = parse_timestamp_strict("2024-03-15T10:00:00.000+01:00").unwrap();
/// assert_eq!(t.to_rfc3339(), "2024-03-15T09:00:00+00:00");
///
/// // Offset-less values are read as UTC
/// let t = parse_timestamp_strict("2024-03-15T10:00:00").unwrap();
/// assert_eq!(t.to_rfc3339(), "2024-03-15T10:00:00+00:00");
///
/// assert!(parse_timestamp_strict("").is_err());
/// assert!(parse_timestamp_strict("10:00").is_err());
/// ```
pub fn parse_timestamp_strict(s: &str) -> Result<Timestamp, TimeError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TimeError::new("empty string"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Some bridges emit "+0100" instead of "+01:00"
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(TimeError::new("unrecognized format"))
}

/// Parse an optional feed timestamp. Malformed values become `None`.
pub fn parse_timestamp(s: Option<&str>) -> Option<Timestamp> {
    s.and_then(|s| parse_timestamp_strict(s).ok())
}

/// Round a duration to whole minutes, halves away from zero.
///
/// # Examples
///
/// ```
/// use chrono::Duration;
/// use rail_timeline::domain::round_minutes;
///
/// assert_eq!(round_minutes(Duration::seconds(89)), 1);
/// assert_eq!(round_minutes(Duration::seconds(90)), 2);
/// assert_eq!(round_minutes(Duration::seconds(-90)), -2);
/// ```
pub fn round_minutes(d: Duration) -> i64 {
    (d.num_milliseconds() as f64 / 60_000.0).round() as i64
}

/// Compare two optional timestamps, treating `None` as +infinity.
pub fn cmp_or_last(a: Option<Timestamp>, b: Option<Timestamp>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
