//! Time sources for the algorithm engines.
//!
//! Engines read timestamps as `f64` seconds. `SystemClock` is what the
//! throttler uses by default; `MockClock` lets tests inject timestamps.

use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Port for obtaining the current time in seconds.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> f64;
}

/// Monotonic clock aligned to UNIX epoch seconds.
///
/// The wall clock is sampled once at construction; afterwards time only moves
/// forward with the process's monotonic `Instant`. Records written to a shared
/// store by different processes remain roughly comparable.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
    epoch_offset: f64,
}

impl SystemClock {
    pub fn new() -> Self {
        let epoch_offset = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_secs_f64();

        Self {
            origin: Instant::now(),
            epoch_offset,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.epoch_offset + self.origin.elapsed().as_secs_f64()
    }
}

/// Manually driven clock.
///
/// Clones share the same time value, so a test can hand one clone to a
/// throttler and advance another.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<f64>>,
}

impl MockClock {
    /// Create a mock clock starting at `start` seconds.
    pub fn new(start: f64) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration.as_secs_f64();
    }

    /// Set the clock to an absolute timestamp.
    pub fn set(&self, seconds: f64) {
        *self.current.lock() = seconds;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Clock for MockClock {
    fn now(&self) -> f64 {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = clock.now();

        assert!(t2 > t1);
        // Roughly aligned with the wall clock
        assert!(t1 > 1_600_000_000.0);
    }

    #[test]
    fn test_mock_clock_shared_between_clones() {
        let clock = MockClock::new(100.0);
        let other = clock.clone();

        other.advance(Duration::from_millis(1500));
        assert_eq!(clock.now(), 101.5);

        clock.set(7.0);
        assert_eq!(other.now(), 7.0);
    }
}
