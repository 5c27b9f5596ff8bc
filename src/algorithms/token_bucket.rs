// src/algorithms/token_bucket.rs

use super::{RateLimitAlgorithm, RateLimitStatus};
use serde::{Deserialize, Serialize};

/// Token Bucket rate limiting algorithm
///
/// The bucket holds at most `quota` tokens and refills continuously at
/// `quota / duration` tokens per second. Each admitted call consumes one
/// token. A new bucket starts full, so an idle key can absorb a burst of
/// `quota` calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenBucket;

/// Counter record for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketState {
    pub tokens: f64,
    pub last_refill: f64,
}

impl TokenBucket {
    /// Refill a bucket for the time elapsed since its last refill
    fn refill(state: BucketState, now: f64, capacity: f64, rate: f64) -> BucketState {
        // A timestamp older than the last refill adds nothing
        let elapsed = (now - state.last_refill).max(0.0);
        BucketState {
            tokens: (state.tokens + elapsed * rate).clamp(0.0, capacity),
            last_refill: state.last_refill.max(now),
        }
    }
}

impl RateLimitAlgorithm for TokenBucket {
    type State = BucketState;
    type Outcome = RateLimitStatus;

    fn evaluate(
        &self,
        state: Option<BucketState>,
        now: f64,
        quota: u64,
        duration: f64,
    ) -> (BucketState, RateLimitStatus) {
        let capacity = quota as f64;
        let rate = capacity / duration;

        let mut state = match state {
            Some(s) => Self::refill(s, now, capacity, rate),
            None => BucketState {
                tokens: capacity,
                last_refill: now,
            },
        };

        let status = if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            let until_full = (capacity - state.tokens) / rate;
            RateLimitStatus::admitted(state.tokens.floor() as u64, quota, until_full)
        } else {
            RateLimitStatus::rejected(quota, (1.0 - state.tokens) / rate)
        };

        (state, status)
    }
}
