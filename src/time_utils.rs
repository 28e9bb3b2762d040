// SPDX-License-Identifier: MIT

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a UTC timestamp with millisecond precision.
///
/// Used for stored `updatedAt` values so that lexical order in the
/// warehouse matches chronological order.
pub fn format_utc_millis(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an upstream ISO-8601 timestamp (e.g. `2024-01-01T00:00:00.000Z`).
pub fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Compact run stamp used in raw object keys (`20240101_060000`).
pub fn run_stamp(date: DateTime<Utc>) -> String {
    date.format("%Y%m%d_%H%M%S").to_string()
}
