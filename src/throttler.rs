// src/throttler.rs
//! Throttle coordinator.
//!
//! A [`Throttler`] starts unconfigured; every operation fails with
//! [`ThrottleError::NotReady`] until [`Throttler::configure`] hands it a
//! counter store. Configuration builds one engine per algorithm over that
//! store. Reconfiguring swaps the whole set, so no engine outlives the store
//! it was built for.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::algorithms::{Algorithm, Engine, RateLimitStatus, Schedule};
use crate::clock::{Clock, SystemClock};
use crate::config::ThrottlerConfig;
use crate::error::{Result, ThrottleError};
use crate::policy::Ticket;
use crate::storage::{AsyncCounterStore, CounterStore};
use crate::throttle_event;

/// Coordinator for callers that block on the counter store
pub type BlockingThrottler = Throttler<dyn CounterStore>;

/// Coordinator for callers on an async runtime
pub type AsyncThrottler = Throttler<dyn AsyncCounterStore>;

#[derive(Debug)]
struct Configured<S: ?Sized> {
    store: Arc<S>,
    config: ThrottlerConfig,
    engines: HashMap<Algorithm, Engine<S>>,
}

impl<S: ?Sized> Configured<S> {
    fn engine(&self, algorithm: Algorithm) -> Result<&Engine<S>> {
        self.engines
            .get(&algorithm)
            .ok_or_else(|| ThrottleError::Config(format!("No engine for {}", algorithm)))
    }

    /// Prefix shared by every key under this keyspace and no sibling keyspace
    fn scope(&self) -> String {
        format!("{}:", self.config.keyspace)
    }
}

#[derive(Debug)]
pub struct Throttler<S: ?Sized> {
    clock: Arc<dyn Clock>,
    state: RwLock<Option<Arc<Configured<S>>>>,
}

impl<S: ?Sized> Default for Throttler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized> Throttler<S> {
    /// Unconfigured throttler reading the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: RwLock::new(None),
        }
    }

    /// Bind the throttler to a store; replaces any previous configuration
    pub fn configure(&self, store: Arc<S>, config: ThrottlerConfig) {
        let engines = Algorithm::ALL
            .into_iter()
            .map(|algorithm| {
                let engine = Engine::new(algorithm, Arc::clone(&store), Arc::clone(&self.clock));
                (algorithm, engine)
            })
            .collect();

        tracing::info!(
            keyspace = %config.keyspace,
            algorithm = %config.algorithm,
            "Throttler configured"
        );

        *self.state.write() = Some(Arc::new(Configured {
            store,
            config,
            engines,
        }));
    }

    pub fn is_ready(&self) -> bool {
        self.state.read().is_some()
    }

    pub fn keyspace(&self) -> Result<String> {
        Ok(self.current()?.config.keyspace.clone())
    }

    pub fn default_algorithm(&self) -> Result<Algorithm> {
        Ok(self.current()?.config.algorithm)
    }

    pub fn config(&self) -> Result<ThrottlerConfig> {
        Ok(self.current()?.config.clone())
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // Snapshot of the configuration; in-flight calls keep the one they started with
    fn current(&self) -> Result<Arc<Configured<S>>> {
        self.state.read().clone().ok_or(ThrottleError::NotReady)
    }
}

pub(crate) fn validate_rate(quota: u64, duration: u64) -> Result<()> {
    if quota == 0 {
        return Err(ThrottleError::Config("quota must be positive".to_string()));
    }
    if duration == 0 {
        return Err(ThrottleError::Config("duration must be positive".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_bucket(bucket_size: u64) -> Result<()> {
    if bucket_size == 0 {
        return Err(ThrottleError::Config(
            "bucket_size must be positive".to_string(),
        ));
    }
    Ok(())
}

fn into_result(
    key: &str,
    algorithm: Algorithm,
    status: RateLimitStatus,
    duration: u64,
) -> Result<RateLimitStatus> {
    throttle_event!(key, algorithm, status.allowed, status.limit, duration);

    if status.allowed {
        Ok(status)
    } else {
        Err(ThrottleError::QuotaExceeded {
            quota: status.limit,
            duration,
            remaining: status.countdown(),
        })
    }
}

fn into_ticket(key: &str, bucket_size: u64, quota: u64, duration: u64, schedule: Schedule) -> Result<Ticket> {
    match schedule {
        Schedule::Dispatch { delay, position } => {
            throttle_event!(key, Algorithm::LeakyBucket, true, quota, duration);
            Ok(Ticket::new(delay, position))
        }
        Schedule::Overflow => {
            tracing::debug!(key = key, bucket_size = bucket_size, "Leaky bucket overflow");
            Err(ThrottleError::CapacityExceeded { bucket_size })
        }
    }
}

impl Throttler<dyn CounterStore> {
    /// Admit or reject one call under a window or token bucket algorithm
    pub fn check_and_consume(
        &self,
        key: &str,
        algorithm: Algorithm,
        quota: u64,
        duration: u64,
    ) -> Result<RateLimitStatus> {
        validate_rate(quota, duration)?;
        let configured = self.current()?;
        let status = configured
            .engine(algorithm)?
            .check_and_record(key, quota, duration as f64)?;
        into_result(key, algorithm, status, duration)
    }

    /// Queue one call on the leaky bucket for `key`
    pub fn schedule(&self, key: &str, bucket_size: u64, quota: u64, duration: u64) -> Result<Ticket> {
        validate_rate(quota, duration)?;
        validate_bucket(bucket_size)?;
        let configured = self.current()?;
        let schedule = configured
            .engine(Algorithm::LeakyBucket)?
            .schedule(key, bucket_size, quota, duration as f64)?;
        into_ticket(key, bucket_size, quota, duration, schedule)
    }

    /// Remove every key under the configured keyspace
    pub fn clear(&self) -> Result<()> {
        let configured = self.current()?;
        configured.store.clear(&configured.scope())
    }

    /// Remove every key in the store
    pub fn clear_all(&self) -> Result<()> {
        self.current()?.store.clear("")
    }
}

impl Throttler<dyn AsyncCounterStore> {
    /// Admit or reject one call under a window or token bucket algorithm
    pub async fn check_and_consume(
        &self,
        key: &str,
        algorithm: Algorithm,
        quota: u64,
        duration: u64,
    ) -> Result<RateLimitStatus> {
        validate_rate(quota, duration)?;
        let configured = self.current()?;
        let status = configured
            .engine(algorithm)?
            .check_and_record(key, quota, duration as f64)
            .await?;
        into_result(key, algorithm, status, duration)
    }

    /// Queue one call on the leaky bucket for `key`
    pub async fn schedule(
        &self,
        key: &str,
        bucket_size: u64,
        quota: u64,
        duration: u64,
    ) -> Result<Ticket> {
        validate_rate(quota, duration)?;
        validate_bucket(bucket_size)?;
        let configured = self.current()?;
        let schedule = configured
            .engine(Algorithm::LeakyBucket)?
            .schedule(key, bucket_size, quota, duration as f64)
            .await?;
        into_ticket(key, bucket_size, quota, duration, schedule)
    }

    /// Remove every key under the configured keyspace
    pub async fn clear(&self) -> Result<()> {
        let configured = self.current()?;
        configured.store.clear(&configured.scope()).await
    }

    /// Remove every key in the store
    pub async fn clear_all(&self) -> Result<()> {
        let configured = self.current()?;
        configured.store.clear("").await
    }
}
