//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, SecondsFormat, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get current Unix timestamp (milliseconds)
    fn now_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        get_timestamp()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_time
    }
}

/// Get current Unix timestamp (milliseconds)
pub fn get_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert Unix timestamp (milliseconds) to an RFC 3339 string in UTC.
///
/// Out-of-range timestamps are rendered as the raw millisecond value.
pub fn timestamp_to_rfc3339(timestamp_millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_millis) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => format!("{}ms", timestamp_millis),
    }
}

/// Format a remaining chess clock value (milliseconds) as `m:ss`.
///
/// Under ten seconds the tenths are shown as well (`0:09.4`). Negative values
/// are clamped to zero.
pub fn format_clock_millis(remaining_millis: i64) -> String {
    let millis = remaining_millis.max(0);
    let total_secs = millis / 1000;
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;

    if total_secs < 10 {
        let tenths = (millis % 1000) / 100;
        format!("{}:{:02}.{}", minutes, seconds, tenths)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
