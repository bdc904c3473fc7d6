//! In-process response cache for the aggregate listing endpoint.
//!
//! Entries live for a fixed TTL. When the map is full, the oldest share of
//! entries by insertion time is dropped in one batch before the new entry
//! goes in. Expired entries stay reachable through [`ListingCache::find_stale`]
//! until they are evicted, so a failing upstream can still be answered.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

use super::config::ListingCacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::listing";
const METRIC_EVICT: &str = "tutorium_listing_cache_evict_total";
const METRIC_STALE_SERVED: &str = "tutorium_listing_stale_served_total";

#[derive(Debug)]
struct ListingEntry<V> {
    value: V,
    inserted_at: Instant,
    hits: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingCacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub evictions: u64,
    pub stale_served: u64,
}

#[derive(Debug)]
pub struct ListingCache<V> {
    config: ListingCacheConfig,
    entries: Mutex<HashMap<String, ListingEntry<V>>>,
    hits: AtomicU64,
    evictions: AtomicU64,
    stale_served: AtomicU64,
}

impl<V: Clone> ListingCache<V> {
    pub fn new(config: ListingCacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            stale_served: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ListingCacheConfig {
        &self.config
    }

    /// Fresh entry for `key`; expired entries are removed.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let fresh = entries
            .get(key)
            .map(|entry| entry.inserted_at.elapsed() < self.config.ttl)?;

        if !fresh {
            entries.remove(key);
            debug!(target = SOURCE, key, "Expired listing entry removed");
            return None;
        }

        let entry = entries.get_mut(key)?;
        entry.hits += 1;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut entries = mutex_lock(&self.entries, SOURCE, "set");

        if !entries.contains_key(&key) && entries.len() >= self.config.capacity {
            let batch = self.config.eviction_batch(entries.len());
            let mut by_age: Vec<(String, Instant)> = entries
                .iter()
                .map(|(key, entry)| (key.clone(), entry.inserted_at))
                .collect();
            by_age.sort_by_key(|(_, inserted_at)| *inserted_at);

            for (victim, _) in by_age.into_iter().take(batch) {
                entries.remove(&victim);
            }
            self.evictions.fetch_add(batch as u64, Ordering::Relaxed);
            counter!(METRIC_EVICT).increment(batch as u64);
            debug!(target = SOURCE, evicted = batch, "Listing cache full; evicted oldest entries");
        }

        entries.insert(
            key,
            ListingEntry {
                value,
                inserted_at: Instant::now(),
                hits: 0,
            },
        );
    }

    /// Any held entry accepted by `usable`, regardless of age. The entry for
    /// `preferred` wins when usable; otherwise the most recently inserted one.
    pub fn find_stale<F>(&self, preferred: &str, usable: F) -> Option<V>
    where
        F: Fn(&V) -> bool,
    {
        let entries = mutex_lock(&self.entries, SOURCE, "find_stale");
        let chosen = entries
            .get(preferred)
            .filter(|entry| usable(&entry.value))
            .or_else(|| {
                entries
                    .values()
                    .filter(|entry| usable(&entry.value))
                    .max_by_key(|entry| entry.inserted_at)
            })?;

        self.stale_served.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_STALE_SERVED).increment(1);
        Some(chosen.value.clone())
    }

    /// Drop every entry, returning how many were held.
    pub fn clear(&self) -> usize {
        let mut entries = mutex_lock(&self.entries, SOURCE, "clear");
        let cleared = entries.len();
        entries.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hits recorded for one entry; `None` when it is not held.
    pub fn entry_hits(&self, key: &str) -> Option<u64> {
        mutex_lock(&self.entries, SOURCE, "entry_hits")
            .get(key)
            .map(|entry| entry.hits)
    }

    pub fn stats(&self) -> ListingCacheStats {
        ListingCacheStats {
            entries: self.len(),
            capacity: self.config.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cache(capacity: usize) -> ListingCache<Vec<u32>> {
        ListingCache::new(ListingCacheConfig {
            capacity,
            ..ListingCacheConfig::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_evicts_oldest_batch() {
        let cache = cache(20);
        for index in 0..20 {
            cache.set(format!("k{index}"), vec![index]);
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        assert_eq!(cache.len(), 20);

        cache.set("k20", vec![20]);

        assert_eq!(cache.len(), 15);
        for index in 0..6 {
            assert_eq!(cache.get(&format!("k{index}")), None, "k{index} evicted");
        }
        for index in 6..=20 {
            assert!(cache.get(&format!("k{index}")).is_some(), "k{index} kept");
        }
        assert_eq!(cache.stats().evictions, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_a_key_never_evicts() {
        let cache = cache(2);
        cache.set("a", vec![1]);
        cache.set("b", vec![2]);
        cache.set("a", vec![3]);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(vec![3]));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_dropped_on_get() {
        let cache = cache(10);
        cache.set("language=css", vec![1]);

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get("language=css"), Some(vec![1]));
        assert_eq!(cache.entry_hits("language=css"), Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("language=css"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_lookup_prefers_requested_key_and_skips_empty_payloads() {
        let cache = cache(10);
        cache.set("popular", vec![1, 2]);
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.set("recent", vec![3]);
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.set("empty", Vec::new());

        tokio::time::advance(Duration::from_secs(600)).await;
        let usable = |posts: &Vec<u32>| !posts.is_empty();

        assert_eq!(cache.find_stale("popular", usable), Some(vec![1, 2]));
        assert_eq!(cache.find_stale("empty", usable), Some(vec![3]));
        assert_eq!(cache.find_stale("unknown", usable), Some(vec![3]));
        assert_eq!(cache.stats().stale_served, 3);
    }

    #[test]
    fn stale_lookup_without_usable_entries_is_none() {
        let cache = cache(10);
        cache.set("empty", Vec::new());
        assert_eq!(cache.find_stale("empty", |posts: &Vec<u32>| !posts.is_empty()), None);
        assert_eq!(cache.stats().stale_served, 0);
    }

    #[test]
    fn clear_reports_dropped_entries() {
        let cache = cache(10);
        cache.set("a", vec![1]);
        cache.set("b", vec![2]);
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }
}
