//! Logical clocks used to rank tenant recency.
//!
//! The cache only compares timestamps, it never interprets them as wall-clock
//! time. Any source that never goes backwards will do.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of monotonic, non-decreasing logical timestamps.
pub trait LogicalClock: Send + Sync {
    fn now(&self) -> u64;
}

impl<F> LogicalClock for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn now(&self) -> u64 {
        self()
    }
}

/// Nanoseconds elapsed since the clock was created.
///
/// `Instant` is already monotonic; the high-water mark only guards against
/// platforms where it is not.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
    high_water: AtomicU64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            high_water: AtomicU64::new(0),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalClock for MonotonicClock {
    fn now(&self) -> u64 {
        let elapsed = u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let previous = self.high_water.fetch_max(elapsed, Ordering::AcqRel);
        previous.max(elapsed)
    }
}

/// Clock that only moves when told to.
///
/// Cheap to clone; clones share the same counter, so a test can keep one
/// handle while the cache owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    ticks: std::sync::Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at `start`.
    pub fn starting_at(start: u64) -> Self {
        let clock = Self::new();
        clock.set(start);
        clock
    }

    /// Move forward one tick and return the new time.
    pub fn advance(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Move forward `n` ticks and return the new time.
    pub fn advance_by(&self, n: u64) -> u64 {
        self.ticks.fetch_add(n, Ordering::AcqRel) + n
    }

    /// Jump to `t`. Ignored if `t` is behind the current time.
    pub fn set(&self, t: u64) {
        self.ticks.fetch_max(t, Ordering::AcqRel);
    }
}

impl LogicalClock for ManualClock {
    fn now(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let mut last = clock.now();
        for _ in 0..1_000 {
            let t = clock.now();
            assert!(t >= last);
            last = t;
        }
    }

    #[test]
    fn manual_clock_set_cannot_rewind() {
        let clock = ManualClock::starting_at(10);
        clock.set(3);
        assert_eq!(clock.now(), 10);
        assert_eq!(clock.advance(), 11);
    }

    #[test]
    fn closures_are_clocks() {
        let clock = || 42_u64;
        assert_eq!(LogicalClock::now(&clock), 42);
    }
}
