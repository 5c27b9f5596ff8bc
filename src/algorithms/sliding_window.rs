// src/algorithms/sliding_window.rs

use super::{RateLimitAlgorithm, RateLimitStatus};
use serde::{Deserialize, Serialize};

/// Sliding Window rate limiting algorithm
///
/// Approximates a true rolling window with two adjacent fixed windows. The
/// previous window's count is weighted by how much of it still overlaps the
/// rolling interval:
///
/// `effective = current + previous * (1 - elapsed_fraction_of_current)`
///
/// A call is admitted when `effective + 1 <= quota`; only admitted calls are
/// counted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlidingWindow;

/// Counter record for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlidingState {
    /// Start of the current window; windows are contiguous from the first call
    pub window_start: f64,
    pub count: u64,
    pub previous: u64,
}

impl SlidingWindow {
    /// Effective count at `now` for a record already rolled to its window
    pub fn weighted_count(state: &SlidingState, now: f64, duration: f64) -> f64 {
        let fraction = ((now - state.window_start) / duration).clamp(0.0, 1.0);
        state.count as f64 + state.previous as f64 * (1.0 - fraction)
    }

    /// Advance the record so that `now` falls in its current window
    fn roll(state: SlidingState, now: f64, duration: f64) -> SlidingState {
        let elapsed = (now - state.window_start).max(0.0);
        let windows = (elapsed / duration).floor();

        if windows < 1.0 {
            state
        } else if windows < 2.0 {
            SlidingState {
                window_start: state.window_start + duration,
                count: 0,
                previous: state.count,
            }
        } else {
            SlidingState {
                window_start: state.window_start + windows * duration,
                count: 0,
                previous: 0,
            }
        }
    }
}

impl RateLimitAlgorithm for SlidingWindow {
    type State = SlidingState;
    type Outcome = RateLimitStatus;

    fn evaluate(
        &self,
        state: Option<SlidingState>,
        now: f64,
        quota: u64,
        duration: f64,
    ) -> (SlidingState, RateLimitStatus) {
        let mut state = match state {
            Some(s) => Self::roll(s, now, duration),
            None => SlidingState {
                window_start: now,
                count: 0,
                previous: 0,
            },
        };

        let weighted = Self::weighted_count(&state, now, duration);
        let window_left = (state.window_start + duration - now).max(0.0);

        let status = if weighted + 1.0 <= quota as f64 + 1e-9 {
            state.count = state.count.saturating_add(1);
            let remaining = (quota as f64 - weighted - 1.0).max(0.0).floor() as u64;
            RateLimitStatus::admitted(remaining, quota, window_left)
        } else {
            RateLimitStatus::rejected(quota, window_left)
        };

        (state, status)
    }
}
