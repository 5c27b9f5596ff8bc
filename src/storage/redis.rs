// src/storage/redis.rs

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Commands, Connection, Script};
use std::fmt;
use std::time::{Duration, Instant};

use crate::config::RedisConfig;
use crate::error::{Result, StorageError};
use crate::storage::{prefix_pattern, AsyncCounterStore, CounterStore};
use crate::storage_op;

/// Writes `ARGV[2]` with expiry `ARGV[3]` only if the current value equals
/// `ARGV[1]`; an empty `ARGV[1]` means the key must not exist.
const COMPARE_AND_SET: &str = r#"
local current = redis.call('GET', KEYS[1])
if ARGV[1] == '' then
    if current then return 0 end
elseif current ~= ARGV[1] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
return 1
"#;

/// Expands the pattern and deletes the matches in one server-side step.
const DELETE_PATTERN: &str = r#"
local keys = redis.call('KEYS', ARGV[1])
for i = 1, #keys, 5000 do
    redis.call('DEL', unpack(keys, i, math.min(i + 4999, #keys)))
end
return #keys
"#;

struct Scripts {
    compare_and_set: Script,
    delete_pattern: Script,
}

impl Scripts {
    fn new() -> Self {
        Self {
            compare_and_set: Script::new(COMPARE_AND_SET),
            delete_pattern: Script::new(DELETE_PATTERN),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn ttl_secs(config: &RedisConfig) -> u64 {
    config.ttl.as_secs().max(1)
}

// A record must not expire before its window or refill period is over
fn ttl_for(config: &RedisConfig, lifetime: Duration) -> u64 {
    ttl_secs(config).max(lifetime.as_secs_f64().ceil() as u64)
}

/// Blocking Redis counter store
pub struct RedisCounter {
    connection: Mutex<Connection>,
    scripts: Scripts,
    config: RedisConfig,
}

impl fmt::Debug for RedisCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCounter")
            .field("url", &self.config.url)
            .field("ttl", &self.config.ttl)
            .finish()
    }
}

impl RedisCounter {
    /// Connects to Redis with the configured timeout
    pub fn new(config: RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str()).map_err(StorageError::from)?;
        let connection = client
            .get_connection_with_timeout(config.connection_timeout)
            .map_err(StorageError::from)?;

        Ok(Self {
            connection: Mutex::new(connection),
            scripts: Scripts::new(),
            config,
        })
    }

    pub fn ping(&self) -> Result<()> {
        let mut conn = self.connection.lock();
        let _: String = redis::cmd("PING").query(&mut *conn)?;
        Ok(())
    }
}

impl CounterStore for RedisCounter {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let start = Instant::now();
        let mut conn = self.connection.lock();
        let result: redis::RedisResult<Option<String>> = conn.get(key);
        storage_op!("get", key, result, elapsed_ms(start));
        Ok(result?)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let start = Instant::now();
        let mut conn = self.connection.lock();
        let result: redis::RedisResult<()> = conn.set_ex(key, value, ttl_secs(&self.config));
        storage_op!("set", key, result, elapsed_ms(start));
        Ok(result?)
    }

    fn compare_and_set(&self, key: &str, expected: Option<&str>, value: &str) -> Result<bool> {
        self.compare_and_set_for(key, expected, value, Duration::ZERO)
    }

    fn compare_and_set_for(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        lifetime: Duration,
    ) -> Result<bool> {
        let start = Instant::now();
        let mut conn = self.connection.lock();
        let result: redis::RedisResult<i32> = self
            .scripts
            .compare_and_set
            .key(key)
            .arg(expected.unwrap_or(""))
            .arg(value)
            .arg(ttl_for(&self.config, lifetime))
            .invoke(&mut *conn);
        storage_op!("compare_and_set", key, result, elapsed_ms(start));
        Ok(result? == 1)
    }

    fn clear(&self, keyspace: &str) -> Result<()> {
        let start = Instant::now();
        let pattern = prefix_pattern(keyspace);
        let mut conn = self.connection.lock();
        let result: redis::RedisResult<i64> = self
            .scripts
            .delete_pattern
            .arg(&pattern)
            .invoke(&mut *conn);
        storage_op!("clear", pattern.as_str(), result, elapsed_ms(start));
        result?;
        Ok(())
    }
}

/// Async Redis counter store backed by a reconnecting connection manager
pub struct AsyncRedisCounter {
    connection: ConnectionManager,
    scripts: Scripts,
    config: RedisConfig,
}

impl fmt::Debug for AsyncRedisCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRedisCounter")
            .field("url", &self.config.url)
            .field("ttl", &self.config.ttl)
            .finish()
    }
}

impl AsyncRedisCounter {
    /// Connects to Redis, failing if the connection takes longer than the configured timeout
    pub async fn new(config: RedisConfig) -> Result<Self> {
        // Open the client - this doesn't actually connect to Redis yet
        let client = Client::open(config.url.as_str()).map_err(StorageError::from)?;

        let connection =
            match tokio::time::timeout(config.connection_timeout, ConnectionManager::new(client))
                .await
            {
                Ok(result) => result.map_err(StorageError::from)?,
                Err(_) => {
                    return Err(StorageError::Timeout {
                        url: config.url.clone(),
                        timeout: config.connection_timeout,
                    }
                    .into());
                }
            };

        Ok(Self {
            connection,
            scripts: Scripts::new(),
            config,
        })
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl AsyncCounterStore for AsyncRedisCounter {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let start = Instant::now();
        let mut conn = self.connection.clone();
        let result: redis::RedisResult<Option<String>> = conn.get(key).await;
        storage_op!("get", key, result, elapsed_ms(start));
        Ok(result?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let start = Instant::now();
        let mut conn = self.connection.clone();
        let result: redis::RedisResult<()> =
            conn.set_ex(key, value, ttl_secs(&self.config)).await;
        storage_op!("set", key, result, elapsed_ms(start));
        Ok(result?)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool> {
        self.compare_and_set_for(key, expected, value, Duration::ZERO)
            .await
    }

    async fn compare_and_set_for(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        lifetime: Duration,
    ) -> Result<bool> {
        let start = Instant::now();
        let mut conn = self.connection.clone();
        let result: redis::RedisResult<i32> = self
            .scripts
            .compare_and_set
            .key(key)
            .arg(expected.unwrap_or(""))
            .arg(value)
            .arg(ttl_for(&self.config, lifetime))
            .invoke_async(&mut conn)
            .await;
        storage_op!("compare_and_set", key, result, elapsed_ms(start));
        Ok(result? == 1)
    }

    async fn clear(&self, keyspace: &str) -> Result<()> {
        let start = Instant::now();
        let pattern = prefix_pattern(keyspace);
        let mut conn = self.connection.clone();
        let result: redis::RedisResult<i64> = self
            .scripts
            .delete_pattern
            .arg(&pattern)
            .invoke_async(&mut conn)
            .await;
        storage_op!("clear", pattern.as_str(), result, elapsed_ms(start));
        result?;
        Ok(())
    }
}
