//! Timestamp parsing and formatting
//!
//! Readings carry timestamps in the form `2025-01-01 00:00:00 +0000 UTC`.
//! Filter operands are more forgiving: the source form, the same without the
//! trailing `UTC`, RFC 3339, a naive `YYYY-MM-DD HH:MM:SS` (taken as UTC) and
//! a bare date (midnight UTC) are all accepted.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::CoreError;

/// Layout of the `time` column in source files.
pub const SOURCE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z UTC";

const OFFSET_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";
const NAIVE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a timestamp in the exact source layout.
pub fn parse_source_timestamp(text: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_str(text.trim(), SOURCE_TIME_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CoreError::InvalidTimestamp(text.to_string()))
}

/// Parse a timestamp given by a user, trying each accepted layout in turn.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, CoreError> {
    let s = text.trim();

    if let Ok(dt) = parse_source_timestamp(s) {
        return Ok(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(s, OFFSET_TIME_FORMAT) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, NAIVE_TIME_FORMAT) {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(CoreError::InvalidTimestamp(text.to_string()))
}

/// Render a timestamp in the source layout.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(SOURCE_TIME_FORMAT).to_string()
}
