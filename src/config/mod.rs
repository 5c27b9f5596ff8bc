// src/config/mod.rs

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::algorithms::Algorithm;
use crate::error::{Result, ThrottleError};

/// Settings the throttler holds once configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottlerConfig {
    /// Prefix for every key this throttler writes; also the scope of `clear`
    #[serde(default = "default_keyspace")]
    pub keyspace: String,

    /// Algorithm used by policies that don't pick one
    #[serde(default)]
    pub algorithm: Algorithm,
}

fn default_keyspace() -> String {
    "premier".to_string()
}

impl Default for ThrottlerConfig {
    fn default() -> Self {
        Self {
            keyspace: default_keyspace(),
            algorithm: Algorithm::default(),
        }
    }
}

impl ThrottlerConfig {
    pub fn new(keyspace: impl Into<String>, algorithm: Algorithm) -> Self {
        Self {
            keyspace: keyspace.into(),
            algorithm,
        }
    }

    /// Load from `PREMIER_KEYSPACE` / `PREMIER_ALGORITHM`, honouring a `.env` file
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::default();
        if let Ok(keyspace) = env::var("PREMIER_KEYSPACE") {
            config.keyspace = keyspace;
        }
        if let Ok(algorithm) = env::var("PREMIER_ALGORITHM") {
            config.algorithm = algorithm.parse()?;
        }
        Ok(config)
    }
}

/// Configuration for the Redis counter stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Minimum expiry applied to every counter record on write. Throttling
    /// records are kept at least as long as their window or refill period.
    #[serde(default = "default_redis_ttl", with = "duration_serde")]
    pub ttl: Duration,

    /// Connection timeout
    #[serde(default = "default_conn_timeout", with = "duration_serde")]
    pub connection_timeout: Duration,
}

fn default_redis_ttl() -> Duration {
    Duration::from_secs(30)
}

fn default_conn_timeout() -> Duration {
    Duration::from_secs(2)
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ttl: default_redis_ttl(),
            connection_timeout: default_conn_timeout(),
        }
    }

    /// Load from `PREMIER_REDIS_URL` / `PREMIER_REDIS_TTL_SECS`
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let url = env::var("PREMIER_REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let mut config = Self::new(url);

        if let Ok(ttl) = env::var("PREMIER_REDIS_TTL_SECS") {
            let secs: u64 = ttl.parse().map_err(|_| {
                ThrottleError::Config(format!("PREMIER_REDIS_TTL_SECS is not a number: {}", ttl))
            })?;
            if secs == 0 {
                return Err(ThrottleError::Config(
                    "PREMIER_REDIS_TTL_SECS must be positive".to_string(),
                ));
            }
            config.ttl = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Configuration for the in-memory counter store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryConfig {
    /// Maximum number of entries to store; unbounded unless set
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Optional expiry for records; none by default
    #[serde(default, with = "option_duration_serde")]
    pub ttl: Option<Duration>,
}

fn default_max_entries() -> usize {
    usize::MAX
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl: None,
        }
    }
}

// Helper module to serialize/deserialize Duration with serde
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
