//! Timestamp parsing/formatting for the document store's ISO-8601-ish
//! `creationDate`/`lastModification` fields (spec.md §6).
//!
//! Grounded in `original_source/cozyfuse/fusepath.py`'s `get_date`, which
//! tries four `strptime` formats in sequence.

use chrono::{NaiveDateTime, TimeZone, Utc};

use crate::error::FsError;

const FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%a %b %d %Y %H:%M:%S",
    "%a %b %d %H:%M:%S %Y",
];

/// Parses a timestamp in any of the formats spec.md §6 requires,
/// returning UTC seconds since the epoch.
pub fn parse_timestamp(raw: &str) -> Result<i64, FsError> {
    for fmt in FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&naive).timestamp());
        }
    }
    Err(FsError::Invalid(format!("unparseable timestamp: {raw}")))
}

/// The canonical format used when this driver writes a fresh timestamp
/// (`creationDate`/`lastModification` on new or touched documents).
pub fn now_iso8601() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_iso8601() {
        assert!(parse_timestamp("2014-05-07T09:17:48").is_ok());
    }

    #[test]
    fn parses_fractional_seconds_with_z() {
        assert!(parse_timestamp("2014-05-07T09:17:48.123Z").is_ok());
    }

    #[test]
    fn parses_ctime_with_year_before_time() {
        assert!(parse_timestamp("Wed May 07 2014 09:17:48").is_ok());
    }

    #[test]
    fn parses_ctime_with_time_before_year() {
        assert!(parse_timestamp("Wed May 07 09:17:48 2014").is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("not a date").is_err());
    }
}
