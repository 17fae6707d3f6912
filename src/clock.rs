//! Logical clock
//!
//! Timestamps are unix nanoseconds, forced strictly increasing so that every
//! WAL entry and every snapshot watermark is distinct and totally ordered.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Strictly increasing nanosecond timestamp source
#[derive(Debug, Default)]
pub struct LogicalClock {
    last: AtomicI64,
}

impl LogicalClock {
    /// Create a clock that has issued nothing yet
    pub fn new() -> Self {
        Self::starting_after(0)
    }

    /// Create a clock whose next timestamp is greater than `floor`
    ///
    /// Used after recovery so new entries sort after replayed history even
    /// if the wall clock moved backwards across a restart.
    pub fn starting_after(floor: i64) -> Self {
        Self {
            last: AtomicI64::new(floor),
        }
    }

    /// Issue the next timestamp: `max(wall clock, last + 1)`
    pub fn tick(&self) -> i64 {
        let now = wall_clock_nanos();
        let mut prev = self.last.load(Ordering::Acquire);
        loop {
            let next = now.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    /// The most recently issued timestamp (or the seed floor)
    pub fn last(&self) -> i64 {
        self.last.load(Ordering::Acquire)
    }
}

fn wall_clock_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
