// library entry
pub mod algorithms;
pub mod clock;
pub mod config;
pub mod error;
pub mod key;
pub mod logging;
pub mod period;
pub mod policy;
pub mod resilience;
pub mod storage;
pub mod throttler;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

// Re-export key components for convenience
pub use algorithms::{Algorithm, RateLimitAlgorithm, RateLimitStatus};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::{InMemoryConfig, RedisConfig, ThrottlerConfig};
pub use error::{Result, StorageError, ThrottleError};
pub use key::{derive_key, FunctionId, KeyMaker};
pub use logging::init as init_logging;
pub use period::Period;
pub use policy::{AsyncThrottled, Policy, PolicyBuilder, Ticket, Throttled};
pub use storage::{AsyncCounterStore, AsyncRedisCounter, CounterStore, MemoryCounter, RedisCounter};
pub use throttler::{AsyncThrottler, BlockingThrottler, Throttler};
