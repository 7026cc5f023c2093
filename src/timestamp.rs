//! Lenient ISO-8601 handling for GPX `<time>` values.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

/// Parse a GPX timestamp.
///
/// Accepts RFC 3339 (`2025-01-30T23:32:36Z`, `...+09:00`, fractional
/// seconds), a date-time without offset (taken as UTC) and a bare date
/// (midnight UTC). Surrounding whitespace is ignored.
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Wall-clock stamp written into `source_info/conversion_date`.
pub fn conversion_stamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
