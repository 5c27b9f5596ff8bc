// src/algorithms/mod.rs

pub mod engine;
pub mod fixed_window;
pub mod leaky_bucket;
pub mod sliding_window;
pub mod token_bucket;

#[cfg(test)]
mod tests;

pub use engine::Engine;
pub use fixed_window::FixedWindow;
pub use leaky_bucket::{LeakyBucket, Schedule};
pub use sliding_window::SlidingWindow;
pub use token_bucket::TokenBucket;

use crate::error::ThrottleError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Tag naming a throttling algorithm; also the algorithm segment of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    FixedWindow,
    SlidingWindow,
    TokenBucket,
    LeakyBucket,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::FixedWindow,
        Algorithm::SlidingWindow,
        Algorithm::TokenBucket,
        Algorithm::LeakyBucket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::FixedWindow => "fixed_window",
            Algorithm::SlidingWindow => "sliding_window",
            Algorithm::TokenBucket => "token_bucket",
            Algorithm::LeakyBucket => "leaky_bucket",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = ThrottleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ThrottleError::Config(format!("Unknown algorithm: {}", s)))
    }
}

/// Status returned by the window and token bucket algorithms
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitStatus {
    /// Whether the call was admitted
    pub allowed: bool,

    /// Calls still available before the next rejection
    pub remaining: u64,

    /// The quota in force
    pub limit: u64,

    /// For rejections, how long until a call would be admitted; for
    /// admissions, how long until the window or bucket replenishes
    pub reset_after: Duration,
}

impl RateLimitStatus {
    pub(crate) fn admitted(remaining: u64, limit: u64, reset_after: f64) -> Self {
        Self {
            allowed: true,
            remaining,
            limit,
            reset_after: Duration::from_secs_f64(reset_after.max(0.0)),
        }
    }

    pub(crate) fn rejected(limit: u64, wait: f64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            limit,
            reset_after: Duration::from_secs_f64(wait.max(0.0)),
        }
    }

    /// `-1.0` when admitted, otherwise seconds to wait before retrying
    pub fn countdown(&self) -> f64 {
        if self.allowed {
            -1.0
        } else {
            self.reset_after.as_secs_f64()
        }
    }
}

/// Core arithmetic shared by every engine.
///
/// `evaluate` is a pure transition from the stored record (if any) to the
/// next record plus a decision. It never touches the store, so the blocking
/// and async engines run exactly the same code.
pub trait RateLimitAlgorithm: Send + Sync + fmt::Debug {
    /// Record persisted in the counter store under the call's key
    type State: Serialize + DeserializeOwned + Send;

    /// Decision handed back to the caller
    type Outcome: Send;

    fn evaluate(
        &self,
        state: Option<Self::State>,
        now: f64,
        quota: u64,
        duration: f64,
    ) -> (Self::State, Self::Outcome);

    /// Seconds a record stays meaningful after its last write
    fn lifetime(&self, _quota: u64, duration: f64) -> f64 {
        duration
    }
}
