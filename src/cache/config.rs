//! Cache configuration.
//!
//! Timings for the remote cache client and limits for the in-process listing
//! cache. Both are derived from the `[cache]` and `[listing]` settings.

use std::time::Duration;

const DEFAULT_OP_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_RECONNECT_BASE_MS: u64 = 500;
const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;
const DEFAULT_POST_TTL_SECS: u64 = 3_600;
const DEFAULT_NEGATIVE_TTL_SECS: u64 = 300;

const DEFAULT_LISTING_CAPACITY: usize = 100;
const DEFAULT_LISTING_TTL_SECS: u64 = 300;
const DEFAULT_LISTING_EVICT_PERCENT: usize = 30;
const DEFAULT_LISTING_FETCH_TIMEOUT_MS: u64 = 8_000;

/// Remote cache client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Upper bound for every single cache operation.
    pub op_timeout: Duration,
    /// First reconnect delay; doubled per attempt.
    pub reconnect_base: Duration,
    /// Ceiling for the reconnect delay.
    pub reconnect_max: Duration,
    /// Reconnect attempts per outage before giving up.
    pub max_reconnect_attempts: u32,
    /// TTL for post snapshots.
    pub post_ttl: Duration,
    /// TTL for confirmed-absent markers.
    pub negative_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_millis(DEFAULT_OP_TIMEOUT_MS),
            reconnect_base: Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
            reconnect_max: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
            max_reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            post_ttl: Duration::from_secs(DEFAULT_POST_TTL_SECS),
            negative_ttl: Duration::from_secs(DEFAULT_NEGATIVE_TTL_SECS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            op_timeout: Duration::from_millis(settings.op_timeout_ms.get()),
            reconnect_base: Duration::from_millis(settings.reconnect_base_ms.get()),
            reconnect_max: Duration::from_millis(settings.reconnect_max_ms.get()),
            max_reconnect_attempts: settings.max_reconnect_attempts.get(),
            post_ttl: Duration::from_secs(settings.post_ttl_secs.get()),
            negative_ttl: Duration::from_secs(settings.negative_ttl_secs.get()),
        }
    }
}

impl CacheConfig {
    /// Delay before reconnect attempt `attempt` (1-based):
    /// `min(base * 2^(attempt - 1), max)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.reconnect_base
            .saturating_mul(factor)
            .min(self.reconnect_max)
    }
}

/// In-process listing response cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
    /// Share of entries evicted together when the cache is full.
    pub evict_percent: usize,
    /// Upper bound for recomputing a listing against the store.
    pub fetch_timeout: Duration,
}

impl Default for ListingCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LISTING_CAPACITY,
            ttl: Duration::from_secs(DEFAULT_LISTING_TTL_SECS),
            evict_percent: DEFAULT_LISTING_EVICT_PERCENT,
            fetch_timeout: Duration::from_millis(DEFAULT_LISTING_FETCH_TIMEOUT_MS),
        }
    }
}

impl From<&crate::config::ListingSettings> for ListingCacheConfig {
    fn from(settings: &crate::config::ListingSettings) -> Self {
        Self {
            capacity: settings.capacity.get(),
            ttl: Duration::from_secs(settings.ttl_secs.get()),
            evict_percent: settings.evict_percent,
            fetch_timeout: Duration::from_millis(settings.fetch_timeout_ms.get()),
        }
    }
}

impl ListingCacheConfig {
    /// Entries to drop when inserting into a full cache holding `len` entries.
    pub fn eviction_batch(&self, len: usize) -> usize {
        (len.saturating_mul(self.evict_percent) / 100).max(1)
    }
}
