// src/storage/memory.rs

// In-process counter store. Safe under a single process; records are not
// shared between independent processes.
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::InMemoryConfig;
use crate::error::{Result, StorageError};
use crate::storage::{AsyncCounterStore, CounterStore};

/// Entry in the in-memory store
#[derive(Debug)]
struct MemoryEntry {
    value: String,
    expiry: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expiry.map_or(true, |expiry| expiry > now)
    }
}

/// In-memory counter store
///
/// Clones share the same map.
#[derive(Debug, Clone)]
pub struct MemoryCounter {
    data: Arc<Mutex<HashMap<String, MemoryEntry>>>,
    config: InMemoryConfig,
}

impl Default for MemoryCounter {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

impl MemoryCounter {
    pub fn new(config: InMemoryConfig) -> Self {
        let data = Arc::new(Mutex::new(HashMap::with_capacity(
            config.max_entries.min(1_024),
        )));

        Self { data, config }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut data = self.data.lock();
        let before = data.len();
        data.retain(|_, entry| entry.is_live(now));
        before - data.len()
    }

    fn read(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut data = self.data.lock();
        match data.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                data.remove(key);
                None
            }
            None => None,
        }
    }

    fn write(&self, data: &mut HashMap<String, MemoryEntry>, key: &str, value: &str) -> Result<()> {
        // Apply max entries limit
        if data.len() >= self.config.max_entries && !data.contains_key(key) {
            let now = Instant::now();
            data.retain(|_, entry| entry.is_live(now));
            if data.len() >= self.config.max_entries {
                return Err(StorageError::CapacityExceeded(self.config.max_entries).into());
            }
        }

        let expiry = self.config.ttl.map(|ttl| Instant::now() + ttl);
        data.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expiry,
            },
        );
        Ok(())
    }

    fn swap_if(&self, key: &str, expected: Option<&str>, value: &str) -> Result<bool> {
        let now = Instant::now();
        let mut data = self.data.lock();

        let current = data
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.as_str());
        if current != expected {
            return Ok(false);
        }

        self.write(&mut data, key, value)?;
        Ok(true)
    }

    fn remove_prefix(&self, keyspace: &str) {
        let mut data = self.data.lock();
        if keyspace.is_empty() {
            data.clear();
            return;
        }
        data.retain(|key, _| !key.starts_with(keyspace));
    }
}

impl CounterStore for MemoryCounter {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.lock();
        self.write(&mut data, key, value)
    }

    fn compare_and_set(&self, key: &str, expected: Option<&str>, value: &str) -> Result<bool> {
        self.swap_if(key, expected, value)
    }

    fn clear(&self, keyspace: &str) -> Result<()> {
        self.remove_prefix(keyspace);
        Ok(())
    }
}

#[async_trait]
impl AsyncCounterStore for MemoryCounter {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.lock();
        self.write(&mut data, key, value)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool> {
        self.swap_if(key, expected, value)
    }

    async fn clear(&self, keyspace: &str) -> Result<()> {
        self.remove_prefix(keyspace);
        Ok(())
    }
}
