// src/storage/mod.rs

pub mod memory;
pub mod redis;

#[cfg(test)]
mod tests;

pub use memory::MemoryCounter;
pub use redis::{AsyncRedisCounter, RedisCounter};

use super::error::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// Blocking counter store.
///
/// Values are serialized JSON records; only the engine that owns a key
/// interprets its value. `set` is a full replace.
pub trait CounterStore: Send + Sync + Debug {
    // Retrieves a value, `None` when absent or expired
    fn get(&self, key: &str) -> Result<Option<String>>;

    // Replaces the value stored under a key
    fn set(&self, key: &str, value: &str) -> Result<()>;

    // Atomically replaces the value if it still equals `expected`
    // (`None` meaning the key must be absent). Returns whether the write happened.
    fn compare_and_set(&self, key: &str, expected: Option<&str>, value: &str) -> Result<bool>;

    // As `compare_and_set`, for a record that stays meaningful for `lifetime`.
    // Stores that expire records must keep this one at least that long.
    fn compare_and_set_for(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        _lifetime: Duration,
    ) -> Result<bool> {
        self.compare_and_set(key, expected, value)
    }

    // Removes every key starting with `keyspace`; an empty keyspace removes everything
    fn clear(&self, keyspace: &str) -> Result<()>;

    fn get_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.get(key)?.unwrap_or_else(|| default.to_string()))
    }
}

/// Counter store for callers on an async runtime.
///
/// Same contract as [`CounterStore`]; calls may suspend the calling task.
#[async_trait]
pub trait AsyncCounterStore: Send + Sync + Debug {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool>;

    async fn compare_and_set_for(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        _lifetime: Duration,
    ) -> Result<bool> {
        self.compare_and_set(key, expected, value).await
    }

    async fn clear(&self, keyspace: &str) -> Result<()>;

    async fn get_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.get(key).await?.unwrap_or_else(|| default.to_string()))
    }
}

/// Glob matching every key that starts with `prefix`, with glob
/// metacharacters in the prefix escaped.
pub(crate) fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}
