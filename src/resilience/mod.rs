// src/resilience/mod.rs
//! Retry pacing for optimistic counter updates.
//!
//! Engines read a record, compute the next one and write it back with
//! compare-and-set. When another caller wins the race the engine retries,
//! spacing attempts with jittered exponential backoff.

mod exponential_backoff;

#[cfg(test)]
mod tests;

pub use exponential_backoff::{ExponentialBackoff, RetryConfig};
