//! Timestamp parsing helpers.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a timestamp from the database - handles both SQLite and RFC3339 formats.
///
/// SQLite `CURRENT_TIMESTAMP` returns `"YYYY-MM-DD HH:MM:SS"`; rows written
/// by other tooling may carry RFC3339 (`"YYYY-MM-DDTHH:MM:SSZ"`).
pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    Err(format!(
        "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
        s
    ))
}
