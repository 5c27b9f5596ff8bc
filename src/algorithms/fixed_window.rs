// src/algorithms/fixed_window.rs

use super::{RateLimitAlgorithm, RateLimitStatus};
use serde::{Deserialize, Serialize};

/// Fixed Window rate limiting algorithm
///
/// Time is divided into windows of `duration` seconds, the first one starting
/// at the first call for a key. Every attempt inside a window is counted;
/// attempts beyond the quota are rejected until the window ends, at which point
/// the counter resets abruptly.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedWindow;

/// Counter record for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowState {
    pub window_start: f64,
    pub count: u64,
}

impl RateLimitAlgorithm for FixedWindow {
    type State = WindowState;
    type Outcome = RateLimitStatus;

    fn evaluate(
        &self,
        state: Option<WindowState>,
        now: f64,
        quota: u64,
        duration: f64,
    ) -> (WindowState, RateLimitStatus) {
        let mut state = match state {
            Some(s) if now - s.window_start < duration => s,
            _ => WindowState {
                window_start: now,
                count: 0,
            },
        };

        state.count = state.count.saturating_add(1);

        // Clock skew between processes can put `now` before the window start
        let elapsed = (now - state.window_start).max(0.0);
        let reset_after = duration - elapsed;

        let status = if state.count <= quota {
            RateLimitStatus::admitted(quota - state.count, quota, reset_after)
        } else {
            RateLimitStatus::rejected(quota, reset_after)
        };

        (state, status)
    }
}
