//! Time and timestamp helpers.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// UTC wall-clock timestamp used for readings, commands and events.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Format a timestamp as fixed-width RFC 3339 (`2024-05-01T12:00:00.000000Z`).
///
/// Fixed width keeps lexical order equal to chronological order, which the
/// storage layer relies on for range queries.
#[must_use]
pub fn format(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one interpreted as UTC.
///
/// Returns `None` when neither form matches.
#[must_use]
pub fn parse(value: &str) -> Option<Timestamp> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.to_utc());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
