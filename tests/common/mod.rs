//! Shared helpers for the integration tests

#![allow(dead_code)] // not every test file uses every helper

pub mod builders;
pub mod mock_helpers;

use chrono::{DateTime, Duration, Utc};

/// How long a consumer may wait for its own lock while another consumer
/// holds theirs
pub const LOCK_WAIT_LIMIT: std::time::Duration = std::time::Duration::from_millis(500);

/// Source time stamp `seconds` after 2024-01-01T00:00:00Z
pub fn source_time(seconds: i64) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
        + Duration::seconds(seconds)
}
