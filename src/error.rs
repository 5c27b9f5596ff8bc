// for error definitions
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThrottleError {
    /// Returned when a call exceeds its quota for the current window or bucket
    #[error("Quota exceeded: {quota} calls per {duration}s, retry after {remaining:.3}s")]
    QuotaExceeded {
        quota: u64,
        duration: u64,
        /// Seconds until the next call would be admitted
        remaining: f64,
    },

    /// Returned when a leaky bucket queue is full
    #[error("Bucket capacity exceeded: {bucket_size} calls already queued")]
    CapacityExceeded { bucket_size: u64 },

    /// The throttler was used before being configured
    #[error("Throttler is not configured")]
    NotReady,

    /// Invalid static parameters (quota, duration, bucket size, algorithm)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to the counter store backend
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ThrottleError {
    /// Whether the error is a throttling decision rather than a failure
    pub fn is_throttled(&self) -> bool {
        matches!(
            self,
            ThrottleError::QuotaExceeded { .. } | ThrottleError::CapacityExceeded { .. }
        )
    }

    /// Whether the counter store failed, as opposed to the call being limited
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, ThrottleError::Storage(_))
    }

    /// Wait hint carried by `QuotaExceeded`
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ThrottleError::QuotaExceeded { remaining, .. } => {
                Some(Duration::from_secs_f64(remaining.max(0.0)))
            }
            _ => None,
        }
    }
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Redis connection errors
    #[error("Redis connection error: {0}")]
    RedisConnection(#[source] redis::RedisError),

    // Redis authentication errors
    #[error("Redis authentication error: {0}")]
    RedisAuth(#[source] redis::RedisError),

    /// Redis command errors
    #[error("Redis command error: {0}")]
    RedisCommand(#[source] redis::RedisError),

    #[error("Connection to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// Data serialization/deserialization errors
    #[error("Data serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// In-memory store refused a new key
    #[error("Maximum entries limit exceeded ({0})")]
    CapacityExceeded(usize),

    /// Optimistic writes kept losing the race for a key
    #[error("Gave up updating {key} after {attempts} conflicting writes")]
    Contention { key: String, attempts: usize },
}

// Implement conversions from redis::RedisError to StorageError
impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::AuthenticationFailed => StorageError::RedisAuth(err),
            redis::ErrorKind::IoError | redis::ErrorKind::ClientError => {
                StorageError::RedisConnection(err)
            }
            _ => StorageError::RedisCommand(err),
        }
    }
}

impl From<redis::RedisError> for ThrottleError {
    fn from(err: redis::RedisError) -> Self {
        ThrottleError::Storage(err.into())
    }
}

impl From<serde_json::Error> for ThrottleError {
    fn from(err: serde_json::Error) -> Self {
        ThrottleError::Storage(err.into())
    }
}

// define a Result type alias for convenience
pub type Result<T> = std::result::Result<T, ThrottleError>;
