//! Monotonic timestamps that fit in an atomic word.

use std::time::{Duration, Instant};

/// Monotonic clock measuring nanoseconds since a shared epoch.
///
/// Timestamps are `u64` so they can be stored in atomics. Zero is reserved
/// for "never"; every reading is at least 1.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Start a clock whose epoch is now.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Nanoseconds since the epoch, never zero.
    #[inline]
    pub fn now_nanos(&self) -> u64 {
        self.nanos_at(Instant::now())
    }

    /// Timestamp of an arbitrary instant (clamped to the epoch).
    pub fn nanos_at(&self, instant: Instant) -> u64 {
        let elapsed = instant.saturating_duration_since(self.epoch);
        u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX).max(1)
    }

    /// Instant corresponding to a timestamp.
    pub fn instant_at(&self, nanos: u64) -> Instant {
        self.epoch + Duration::from_nanos(nanos)
    }

    /// Time elapsed since a timestamp, or `None` for "never".
    pub fn since(&self, nanos: u64) -> Option<Duration> {
        if nanos == 0 {
            return None;
        }
        Some(Duration::from_nanos(self.now_nanos().saturating_sub(nanos)))
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
