// src/policy.rs
//! Attaching a throttling policy to a function.
//!
//! ```no_run
//! use std::sync::Arc;
//! use premier::{function_id, BlockingThrottler, MemoryCounter, Policy, ThrottlerConfig};
//!
//! let throttler = Arc::new(BlockingThrottler::new());
//! throttler.configure(Arc::new(MemoryCounter::default()), ThrottlerConfig::default());
//!
//! let policy = Policy::<(u32,)>::builder()
//!     .quota(3)
//!     .duration(10)
//!     .key_maker(|(user,): &(u32,)| user.to_string())
//!     .build()?;
//! let lookup = policy.wrap(throttler, function_id!("lookup"), |(user,): (u32,)| user * 2)?;
//!
//! assert_eq!(lookup.call((21,))?, 42);
//! # Ok::<(), premier::ThrottleError>(())
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::algorithms::Algorithm;
use crate::error::{Result, ThrottleError};
use crate::key::{derive_key, FunctionId, KeyMaker};
use crate::period::Period;
use crate::throttler::{validate_bucket, validate_rate, AsyncThrottler, BlockingThrottler};

/// Slot handed out by a leaky bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ticket {
    /// How long the call must wait before running
    pub delay: Duration,
    /// Calls queued ahead of this one
    pub position: u64,
}

impl Ticket {
    pub(crate) fn new(delay: f64, position: u64) -> Self {
        Self {
            delay: Duration::from_secs_f64(delay.max(0.0)),
            position,
        }
    }

    /// Block the current thread until the slot comes up
    pub fn wait(&self) {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }

    pub async fn wait_async(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// Static throttling parameters for one call site.
///
/// `A` is the type of the wrapped function's argument, usually a tuple.
pub struct Policy<A> {
    quota: u64,
    duration: u64,
    algorithm: Option<Algorithm>,
    key_maker: Option<Arc<KeyMaker<A>>>,
    bucket_size: Option<u64>,
}

impl<A> Clone for Policy<A> {
    fn clone(&self) -> Self {
        Self {
            quota: self.quota,
            duration: self.duration,
            algorithm: self.algorithm,
            key_maker: self.key_maker.clone(),
            bucket_size: self.bucket_size,
        }
    }
}

impl<A> fmt::Debug for Policy<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("quota", &self.quota)
            .field("duration", &self.duration)
            .field("algorithm", &self.algorithm)
            .field("key_maker", &self.key_maker.is_some())
            .field("bucket_size", &self.bucket_size)
            .finish()
    }
}

impl<A> Policy<A> {
    pub fn builder() -> PolicyBuilder<A> {
        PolicyBuilder::default()
    }

    pub fn quota(&self) -> u64 {
        self.quota
    }

    /// Window or refill period in seconds
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Algorithm override; `None` defers to the throttler's default
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub fn bucket_size(&self) -> Option<u64> {
        self.bucket_size
    }

    fn resolve(&self, default: Algorithm) -> Result<Algorithm> {
        let algorithm = self.algorithm.unwrap_or(default);
        if algorithm == Algorithm::LeakyBucket && self.bucket_size.is_none() {
            return Err(ThrottleError::Config(
                "leaky_bucket requires a bucket_size".to_string(),
            ));
        }
        Ok(algorithm)
    }

    /// Wrap a function for blocking callers
    pub fn wrap<F, R>(
        &self,
        throttler: Arc<BlockingThrottler>,
        function: FunctionId,
        f: F,
    ) -> Result<Throttled<A, F>>
    where
        F: Fn(A) -> R,
    {
        let algorithm = self.resolve(throttler.default_algorithm()?)?;
        Ok(Throttled {
            guard: Guard {
                policy: self.clone(),
                algorithm,
                function,
            },
            throttler,
            f: Arc::new(f),
        })
    }

    /// Wrap an async function
    pub fn wrap_async<F, Fut>(
        &self,
        throttler: Arc<AsyncThrottler>,
        function: FunctionId,
        f: F,
    ) -> Result<AsyncThrottled<A, F>>
    where
        F: Fn(A) -> Fut,
        Fut: Future,
    {
        let algorithm = self.resolve(throttler.default_algorithm()?)?;
        Ok(AsyncThrottled {
            guard: Guard {
                policy: self.clone(),
                algorithm,
                function,
            },
            throttler,
            f: Arc::new(f),
        })
    }
}

/// Builder for [`Policy`]
pub struct PolicyBuilder<A> {
    quota: Option<u64>,
    duration: Option<Period>,
    algorithm: Option<Algorithm>,
    key_maker: Option<Arc<KeyMaker<A>>>,
    bucket_size: Option<u64>,
}

impl<A> Default for PolicyBuilder<A> {
    fn default() -> Self {
        Self {
            quota: None,
            duration: None,
            algorithm: None,
            key_maker: None,
            bucket_size: None,
        }
    }
}

impl<A> PolicyBuilder<A> {
    pub fn quota(mut self, quota: u64) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Window or refill period in seconds
    pub fn duration(mut self, seconds: u64) -> Self {
        self.duration = Some(Period::from_seconds(seconds));
        self
    }

    /// Same as `duration`, from a [`Period`] or a `std::time::Duration` (whole seconds)
    pub fn period(mut self, period: impl Into<Period>) -> Self {
        self.duration = Some(period.into());
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Derive a key suffix from the call's arguments, giving each distinct
    /// suffix its own counter
    pub fn key_maker<K>(mut self, key_maker: K) -> Self
    where
        K: Fn(&A) -> String + Send + Sync + 'static,
    {
        self.key_maker = Some(Arc::new(key_maker));
        self
    }

    pub fn bucket_size(mut self, bucket_size: u64) -> Self {
        self.bucket_size = Some(bucket_size);
        self
    }

    pub fn build(self) -> Result<Policy<A>> {
        let quota = self
            .quota
            .ok_or_else(|| ThrottleError::Config("quota is required".to_string()))?;
        let duration = self
            .duration
            .ok_or_else(|| ThrottleError::Config("duration is required".to_string()))?
            .as_seconds();

        validate_rate(quota, duration)?;
        if let Some(bucket_size) = self.bucket_size {
            validate_bucket(bucket_size)?;
        }

        let policy = Policy {
            quota,
            duration,
            algorithm: self.algorithm,
            key_maker: self.key_maker,
            bucket_size: self.bucket_size,
        };

        // An explicit leaky bucket can be checked now; a defaulted one at wrap time
        if let Some(algorithm) = policy.algorithm {
            policy.resolve(algorithm)?;
        }
        Ok(policy)
    }
}

/// Per-call key derivation shared by both wrappers
struct Guard<A> {
    policy: Policy<A>,
    algorithm: Algorithm,
    function: FunctionId,
}

impl<A> Guard<A> {
    fn key(&self, keyspace: &str, args: &A) -> String {
        derive_key(
            &self.function,
            self.algorithm,
            keyspace,
            self.policy.key_maker.as_deref(),
            args,
        )
    }

    fn bucket_size(&self) -> u64 {
        // resolve() refuses a leaky bucket without one
        self.policy.bucket_size.unwrap_or(1)
    }
}

/// A function guarded by a policy, for blocking callers
pub struct Throttled<A, F> {
    guard: Guard<A>,
    throttler: Arc<BlockingThrottler>,
    f: Arc<F>,
}

impl<A, F, R> Throttled<A, F>
where
    F: Fn(A) -> R,
{
    pub fn algorithm(&self) -> Algorithm {
        self.guard.algorithm
    }

    pub fn function(&self) -> &FunctionId {
        &self.guard.function
    }

    /// Counter key this call would use
    pub fn key_for(&self, args: &A) -> Result<String> {
        Ok(self.guard.key(&self.throttler.keyspace()?, args))
    }

    fn admit(&self, args: &A) -> Result<Option<Ticket>> {
        let key = self.key_for(args)?;
        let policy = &self.guard.policy;

        if self.guard.algorithm == Algorithm::LeakyBucket {
            let ticket = self.throttler.schedule(
                &key,
                self.guard.bucket_size(),
                policy.quota,
                policy.duration,
            )?;
            return Ok(Some(ticket));
        }

        self.throttler
            .check_and_consume(&key, self.guard.algorithm, policy.quota, policy.duration)?;
        Ok(None)
    }

    /// Run the function if admitted. Under a leaky bucket this blocks until
    /// the call's slot comes up.
    pub fn call(&self, args: A) -> Result<R> {
        if let Some(ticket) = self.admit(&args)? {
            ticket.wait();
        }
        Ok((self.f)(args))
    }

    /// Admit now and run the function on its own thread, after the call's
    /// slot comes up when under a leaky bucket.
    pub fn call_deferred(&self, args: A) -> Result<std::thread::JoinHandle<R>>
    where
        A: Send + 'static,
        F: Send + Sync + 'static,
        R: Send + 'static,
    {
        let ticket = self.admit(&args)?;
        let f = Arc::clone(&self.f);

        Ok(std::thread::spawn(move || {
            if let Some(ticket) = ticket {
                ticket.wait();
            }
            f(args)
        }))
    }
}

/// A function guarded by a policy, for async callers
pub struct AsyncThrottled<A, F> {
    guard: Guard<A>,
    throttler: Arc<AsyncThrottler>,
    f: Arc<F>,
}

impl<A, F, Fut> AsyncThrottled<A, F>
where
    F: Fn(A) -> Fut,
    Fut: Future,
{
    pub fn algorithm(&self) -> Algorithm {
        self.guard.algorithm
    }

    pub fn function(&self) -> &FunctionId {
        &self.guard.function
    }

    /// Counter key this call would use
    pub fn key_for(&self, args: &A) -> Result<String> {
        Ok(self.guard.key(&self.throttler.keyspace()?, args))
    }

    async fn admit(&self, args: &A) -> Result<Option<Ticket>> {
        let key = self.key_for(args)?;
        let policy = &self.guard.policy;

        if self.guard.algorithm == Algorithm::LeakyBucket {
            let ticket = self
                .throttler
                .schedule(&key, self.guard.bucket_size(), policy.quota, policy.duration)
                .await?;
            return Ok(Some(ticket));
        }

        self.throttler
            .check_and_consume(&key, self.guard.algorithm, policy.quota, policy.duration)
            .await?;
        Ok(None)
    }

    /// Run the function if admitted. Under a leaky bucket the task sleeps
    /// until the call's slot comes up.
    pub async fn call(&self, args: A) -> Result<Fut::Output> {
        if let Some(ticket) = self.admit(&args).await? {
            ticket.wait_async().await;
        }
        Ok((self.f)(args).await)
    }

    /// Admit now and run the function on a spawned task, after the call's
    /// slot comes up when under a leaky bucket.
    pub async fn call_deferred(&self, args: A) -> Result<tokio::task::JoinHandle<Fut::Output>>
    where
        A: Send + 'static,
        F: Send + Sync + 'static,
        Fut: Send + 'static,
        Fut::Output: Send + 'static,
    {
        let ticket = self.admit(&args).await?;
        let f = Arc::clone(&self.f);

        Ok(tokio::spawn(async move {
            if let Some(ticket) = ticket {
                ticket.wait_async().await;
            }
            f(args).await
        }))
    }
}
