//! Tutorium cache system
//!
//! Two independent layers:
//!
//! - **Remote cache** ([`CacheClient`]): read-through post snapshots behind a
//!   client that never fails its callers. The backend is Redis, a
//!   process-local map, or nothing at all.
//! - **Listing cache** ([`ListingCache`]): in-process responses for the
//!   aggregate listing endpoint with batch eviction and stale serving.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "redis"
//! url = "redis://127.0.0.1:6379"
//! op_timeout_ms = 2000
//!
//! [listing]
//! capacity = 100
//! ttl_secs = 300
//! ```

mod backend;
mod client;
mod config;
mod keys;
mod listing;
mod lock;
mod memory;

pub use backend::{CacheConnection, CacheConnector, CacheError};
pub use client::{CacheClient, CacheClientStats, CacheHealthReport, ConnectionState, Lookup};
pub use config::{CacheConfig, ListingCacheConfig};
pub use keys::{CacheKey, post_key, post_key_variants, request_post_key};
pub use listing::{ListingCache, ListingCacheStats};
pub use memory::{MemoryConnection, MemoryConnector};

pub(crate) use lock::{rw_read, rw_write};
