//! Time source abstraction
//!
//! Window starts and TTL deadlines are derived from unix seconds obtained
//! through [`TimeSource`], so tests can pin the clock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the current unix time in seconds.
pub trait TimeSource: Send + Sync {
    /// Current unix time, in whole seconds.
    fn unix_now(&self) -> i64;
}

/// Production time source backed by the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn unix_now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}
