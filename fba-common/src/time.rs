//! Timestamp helpers
//!
//! Timestamps are stored as RFC 3339 text with fixed microsecond precision so
//! that lexical order matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// Current time formatted for storage
pub fn now_rfc3339() -> String {
    to_rfc3339(Utc::now())
}

pub fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_roundtrip_keeps_microseconds() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 5).unwrap()
            + chrono::Duration::microseconds(123_456);
        let text = to_rfc3339(ts);
        assert_eq!(text, "2025-03-01T12:30:05.123456Z");
        assert_eq!(parse_rfc3339(&text).unwrap(), ts);
    }

    #[test]
    fn test_lexical_order_is_chronological() {
        let a = to_rfc3339(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
        let b = to_rfc3339(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap());
        assert!(a < b);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_rfc3339("yesterday").is_err());
    }
}
