//! Process-local cache backend.
//!
//! Used when no remote cache is configured and in tests. Entries carry their
//! own expiry and are dropped lazily on access. Every connection opened by one
//! [`MemoryConnector`] shares the same map, so a reconnect keeps the data.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::backend::{CacheConnection, CacheConnector, CacheError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryConnector {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheConnector for MemoryConnector {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self) -> Result<Arc<dyn CacheConnection>, CacheError> {
        Ok(Arc::new(MemoryConnection {
            entries: Arc::clone(&self.entries),
        }))
    }
}

pub struct MemoryConnection {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryConnection {
    fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let value = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
            Some(_) => None,
            None => return None,
        };
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        value
    }

    fn insert(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
    }
}

#[async_trait]
impl CacheConnection for MemoryConnection {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.insert(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| entry.is_live(now)))
    }

    async fn increment(&self, key: &str, amount: i64) -> Result<i64, CacheError> {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert(Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        if !entry.is_live(now) {
            *entry = Entry {
                value: "0".to_string(),
                expires_at: None,
            };
        }

        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| CacheError::command("incrby", "value is not an integer"))?;
        let next = current
            .checked_add(amount)
            .ok_or_else(|| CacheError::command("incrby", "increment would overflow"))?;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live_value(key).is_some())
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        Ok(keys.iter().map(|key| self.live_value(key)).collect())
    }

    async fn multi_set(
        &self,
        entries: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        for (key, value) in entries {
            self.insert(key, value, ttl);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }

    async fn key_count(&self) -> Result<u64, CacheError> {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
        Ok(self.entries.len() as u64)
    }
}
