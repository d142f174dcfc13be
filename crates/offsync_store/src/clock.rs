//! Logical clock for record timestamps.

use offsync_protocol::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in milliseconds.
pub fn now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Timestamp
}

/// A strictly increasing millisecond clock.
///
/// Ticks follow wall-clock time but never repeat or go backwards, which
/// keeps `last_modified` monotonic per record and makes `created_at`
/// unique across records of one store.
#[derive(Debug, Default)]
pub struct LogicalClock {
    last: AtomicU64,
}

impl LogicalClock {
    /// Creates a new clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next timestamp: wall clock, or one past the previous
    /// tick if the wall clock has not advanced.
    pub fn next(&self) -> Timestamp {
        let now = now_ms();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self.last.compare_exchange_weak(
                prev,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Advances the clock so future ticks exceed the given timestamp.
    ///
    /// Used after importing state stamped by another clock.
    pub fn advance_to(&self, timestamp: Timestamp) {
        self.last.fetch_max(timestamp, Ordering::Relaxed);
    }
}
