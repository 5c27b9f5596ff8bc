// src/algorithms/engine.rs

use std::sync::Arc;
use std::time::Duration;

use super::{
    Algorithm, FixedWindow, LeakyBucket, RateLimitAlgorithm, RateLimitStatus, Schedule,
    SlidingWindow, TokenBucket,
};
use crate::clock::Clock;
use crate::error::{Result, StorageError, ThrottleError};
use crate::resilience::{ExponentialBackoff, RetryConfig};
use crate::storage::{AsyncCounterStore, CounterStore};

// Retries beyond this many are logged at warn
const NOISY_RETRIES: usize = 8;

/// Binds an algorithm to a counter store and a clock.
///
/// Engines hold no counter state of their own. Each decision reads the key's
/// record, runs the algorithm's pure `evaluate`, and writes the result back
/// with compare-and-set, retrying if another caller updated the key first.
#[derive(Debug)]
pub struct Engine<S: ?Sized> {
    algorithm: Algorithm,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    retry: RetryConfig,
}

impl<S: ?Sized> Engine<S> {
    pub fn new(algorithm: Algorithm, store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            algorithm,
            store,
            clock,
            retry: RetryConfig::contention(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn not_windowed(&self) -> ThrottleError {
        ThrottleError::Config(format!(
            "{} schedules calls; use schedule() instead of check_and_record()",
            self.algorithm
        ))
    }

    fn not_leaky(&self) -> ThrottleError {
        ThrottleError::Config(format!(
            "{} does not queue calls; use check_and_record() instead of schedule()",
            self.algorithm
        ))
    }
}

/// Decode a stored record; a value that no longer parses starts a fresh record
fn decode<A: RateLimitAlgorithm>(raw: Option<&str>, key: &str) -> Option<A::State> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(key = key, error = %e, "Discarding unreadable counter record");
            None
        }
    }
}

fn contention(key: &str, backoff: &ExponentialBackoff) -> ThrottleError {
    StorageError::Contention {
        key: key.to_string(),
        attempts: backoff.attempts(),
    }
    .into()
}

fn log_retry(key: &str, attempt: usize) {
    if attempt > NOISY_RETRIES {
        tracing::warn!(key = key, attempt = attempt, "Counter update keeps conflicting");
    } else {
        tracing::debug!(key = key, attempt = attempt, "Counter update conflicted, retrying");
    }
}

impl Engine<dyn CounterStore> {
    /// Admission decision for the window and token bucket algorithms
    pub fn check_and_record(&self, key: &str, quota: u64, duration: f64) -> Result<RateLimitStatus> {
        match self.algorithm {
            Algorithm::FixedWindow => self.run(&FixedWindow, key, quota, duration),
            Algorithm::SlidingWindow => self.run(&SlidingWindow, key, quota, duration),
            Algorithm::TokenBucket => self.run(&TokenBucket, key, quota, duration),
            Algorithm::LeakyBucket => Err(self.not_windowed()),
        }
    }

    /// Queue a call on a leaky bucket
    pub fn schedule(&self, key: &str, bucket_size: u64, quota: u64, duration: f64) -> Result<Schedule> {
        if self.algorithm != Algorithm::LeakyBucket {
            return Err(self.not_leaky());
        }
        self.run(&LeakyBucket::new(bucket_size), key, quota, duration)
    }

    fn run<A: RateLimitAlgorithm>(
        &self,
        algorithm: &A,
        key: &str,
        quota: u64,
        duration: f64,
    ) -> Result<A::Outcome> {
        let mut backoff = ExponentialBackoff::new(self.retry.clone());
        let lifetime = Duration::from_secs_f64(algorithm.lifetime(quota, duration).max(0.0));

        loop {
            let current = self.store.get(key)?;
            let state = decode::<A>(current.as_deref(), key);
            let (next, outcome) = algorithm.evaluate(state, self.clock.now(), quota, duration);
            let encoded = serde_json::to_string(&next)?;

            if self
                .store
                .compare_and_set_for(key, current.as_deref(), &encoded, lifetime)?
            {
                return Ok(outcome);
            }

            match backoff.next_backoff() {
                Some(delay) => {
                    log_retry(key, backoff.attempts());
                    std::thread::sleep(delay);
                }
                None => return Err(contention(key, &backoff)),
            }
        }
    }
}

impl Engine<dyn AsyncCounterStore> {
    /// Admission decision for the window and token bucket algorithms
    pub async fn check_and_record(
        &self,
        key: &str,
        quota: u64,
        duration: f64,
    ) -> Result<RateLimitStatus> {
        match self.algorithm {
            Algorithm::FixedWindow => self.run(&FixedWindow, key, quota, duration).await,
            Algorithm::SlidingWindow => self.run(&SlidingWindow, key, quota, duration).await,
            Algorithm::TokenBucket => self.run(&TokenBucket, key, quota, duration).await,
            Algorithm::LeakyBucket => Err(self.not_windowed()),
        }
    }

    /// Queue a call on a leaky bucket
    pub async fn schedule(
        &self,
        key: &str,
        bucket_size: u64,
        quota: u64,
        duration: f64,
    ) -> Result<Schedule> {
        if self.algorithm != Algorithm::LeakyBucket {
            return Err(self.not_leaky());
        }
        self.run(&LeakyBucket::new(bucket_size), key, quota, duration)
            .await
    }

    async fn run<A: RateLimitAlgorithm>(
        &self,
        algorithm: &A,
        key: &str,
        quota: u64,
        duration: f64,
    ) -> Result<A::Outcome> {
        let mut backoff = ExponentialBackoff::new(self.retry.clone());
        let lifetime = Duration::from_secs_f64(algorithm.lifetime(quota, duration).max(0.0));

        loop {
            let current = self.store.get(key).await?;
            let (encoded, outcome) = {
                let state = decode::<A>(current.as_deref(), key);
                let (next, outcome) = algorithm.evaluate(state, self.clock.now(), quota, duration);
                (serde_json::to_string(&next)?, outcome)
            };

            // The only mutation is this single write, so a caller dropped
            // while suspended leaves the record untouched
            if self
                .store
                .compare_and_set_for(key, current.as_deref(), &encoded, lifetime)
                .await?
            {
                return Ok(outcome);
            }

            match backoff.next_backoff() {
                Some(delay) => {
                    log_retry(key, backoff.attempts());
                    tokio::time::sleep(delay).await;
                }
                None => return Err(contention(key, &backoff)),
            }
        }
    }
}
