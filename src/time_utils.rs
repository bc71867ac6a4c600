// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time conversion.
//!
//! History timestamps are stored as epoch milliseconds so range scans
//! compare integers rather than strings.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Convert epoch milliseconds to a UTC instant.
///
/// Out-of-range values clamp to the Unix epoch.
pub fn from_epoch_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Convert a UTC instant to epoch milliseconds.
pub fn to_epoch_millis(date: DateTime<Utc>) -> i64 {
    date.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_millis_conversion() {
        let date = Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap();
        let millis = to_epoch_millis(date);
        assert_eq!(millis, 1_710_055_800_000);
        assert_eq!(from_epoch_millis(millis), date);
    }

    #[test]
    fn test_format_rfc3339() {
        let date = Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap();
        assert_eq!(format_utc_rfc3339(date), "2024-03-10T07:30:00Z");
    }
}
