// SPDX-License-Identifier: MIT

//! Shared helpers for date/time handling.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current time as epoch seconds.
pub fn epoch_now() -> i64 {
    Utc::now().timestamp()
}

/// Absolute difference between two timestamps, in whole minutes.
pub fn abs_diff_minutes(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    (a - b).num_minutes().abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rfc3339_z_suffix() {
        let dt = Utc.with_ymd_and_hms(2025, 11, 3, 12, 0, 0).unwrap();
        assert_eq!(format_utc_rfc3339(dt), "2025-11-03T12:00:00Z");
    }

    #[test]
    fn test_abs_diff_minutes_symmetric() {
        let a = Utc.with_ymd_and_hms(2025, 11, 3, 12, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 11, 3, 14, 30, 0).unwrap();
        assert_eq!(abs_diff_minutes(a, b), 150);
        assert_eq!(abs_diff_minutes(b, a), 150);
    }
}
