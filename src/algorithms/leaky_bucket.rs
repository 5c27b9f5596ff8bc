// src/algorithms/leaky_bucket.rs

use super::RateLimitAlgorithm;
use serde::{Deserialize, Serialize};

/// Leaky Bucket scheduling algorithm
///
/// Instead of admitting or rejecting a call outright, the leaky bucket queues
/// it and hands back the delay after which it may run. The queue drains at
/// `quota / duration` calls per second and holds at most `bucket_size` calls;
/// a call arriving at a full queue overflows.
///
/// The queue is tracked as a meter: `level` is the number of calls not yet
/// drained. Each admitted call is dispatched `level * interval` seconds from
/// now, so dispatch times grow strictly in admission order.
#[derive(Debug, Clone, Copy)]
pub struct LeakyBucket {
    bucket_size: u64,
}

/// Meter record for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakyState {
    pub level: f64,
    pub last_leak: f64,
}

/// Outcome of offering a call to a leaky bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    /// Queued; run after `delay` seconds with `position` calls ahead of it
    Dispatch { delay: f64, position: u64 },
    /// The queue already holds `bucket_size` calls
    Overflow,
}

impl LeakyBucket {
    pub fn new(bucket_size: u64) -> Self {
        Self { bucket_size }
    }

    pub fn bucket_size(&self) -> u64 {
        self.bucket_size
    }
}

// Float slack so that a level of exactly `bucket_size` after draining still admits
const EPSILON: f64 = 1e-9;

impl RateLimitAlgorithm for LeakyBucket {
    type State = LeakyState;
    type Outcome = Schedule;

    // A full bucket takes `bucket_size` intervals to drain
    fn lifetime(&self, quota: u64, duration: f64) -> f64 {
        duration * (self.bucket_size as f64 / quota as f64).max(1.0)
    }

    fn evaluate(
        &self,
        state: Option<LeakyState>,
        now: f64,
        quota: u64,
        duration: f64,
    ) -> (LeakyState, Schedule) {
        let interval = duration / quota as f64;

        let mut state = match state {
            Some(s) => {
                let elapsed = (now - s.last_leak).max(0.0);
                LeakyState {
                    level: (s.level - elapsed / interval).max(0.0),
                    last_leak: s.last_leak.max(now),
                }
            }
            None => LeakyState {
                level: 0.0,
                last_leak: now,
            },
        };

        if state.level + 1.0 > self.bucket_size as f64 + EPSILON {
            return (state, Schedule::Overflow);
        }

        let schedule = Schedule::Dispatch {
            delay: state.level * interval,
            position: (state.level - EPSILON).ceil().max(0.0) as u64,
        };
        state.level += 1.0;

        (state, schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay(schedule: Schedule) -> f64 {
        match schedule {
            Schedule::Dispatch { delay, .. } => delay,
            Schedule::Overflow => panic!("unexpected overflow"),
        }
    }

    #[test]
    fn test_lifetime_covers_full_drain() {
        assert_eq!(LeakyBucket::new(10).lifetime(2, 60.0), 300.0);
        assert_eq!(LeakyBucket::new(1).lifetime(5, 60.0), 60.0);
    }

    #[test]
    fn test_delays_follow_drain_interval() {
        let bucket = LeakyBucket::new(3);
        let (state, first) = bucket.evaluate(None, 0.0, 2, 1.0);
        let (state, second) = bucket.evaluate(Some(state), 0.0, 2, 1.0);
        let (state, third) = bucket.evaluate(Some(state), 0.0, 2, 1.0);

        assert_eq!(delay(first), 0.0);
        assert_eq!(delay(second), 0.5);
        assert_eq!(delay(third), 1.0);
        assert_eq!(state.level, 3.0);

        let (_, fourth) = bucket.evaluate(Some(state), 0.0, 2, 1.0);
        assert_eq!(fourth, Schedule::Overflow);
    }

    #[test]
    fn test_partial_drain_admits_at_fractional_delay() {
        let bucket = LeakyBucket::new(2);
        let state = LeakyState {
            level: 2.0,
            last_leak: 0.0,
        };

        // 0.25s drains a quarter call at one call per second; still full
        let (state, schedule) = bucket.evaluate(Some(state), 0.25, 1, 1.0);
        assert_eq!(schedule, Schedule::Overflow);

        let (state, schedule) = bucket.evaluate(Some(state), 1.0, 1, 1.0);
        assert_eq!(
            schedule,
            Schedule::Dispatch {
                delay: 1.0,
                position: 1
            }
        );
        assert_eq!(state.level, 2.0);
    }
}
