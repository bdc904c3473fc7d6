//! Transport seam between [`CacheClient`](super::CacheClient) and a concrete
//! key/value backend.
//!
//! Backends report every failure as a [`CacheError`]; the client decides what
//! to do with it. Connection-level failures move the client back to
//! `Disconnected` and schedule a reconnect, anything else is absorbed as a
//! single failed operation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection failed: {0}")]
    Connection(String),
    #[error("cache command `{op}` failed: {message}")]
    Command { op: &'static str, message: String },
}

impl CacheError {
    pub fn connection(message: impl Into<String>) -> Self {
        CacheError::Connection(message.into())
    }

    pub fn command(op: &'static str, message: impl Into<String>) -> Self {
        CacheError::Command {
            op,
            message: message.into(),
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, CacheError::Connection(_))
    }
}

/// Opens connections to a cache backend.
#[async_trait]
pub trait CacheConnector: Send + Sync {
    /// Short backend name for logs and stats.
    fn name(&self) -> &'static str;

    async fn connect(&self) -> Result<Arc<dyn CacheConnection>, CacheError>;
}

/// One established connection. Values are opaque strings; the client owns
/// serialization.
#[async_trait]
pub trait CacheConnection: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Increment an integer value, creating it at `amount` when missing.
    async fn increment(&self, key: &str, amount: i64) -> Result<i64, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Results are aligned with `keys`.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError>;

    async fn multi_set(&self, entries: &[(String, String)], ttl: Duration)
    -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;

    async fn flush(&self) -> Result<(), CacheError>;

    async fn key_count(&self) -> Result<u64, CacheError>;
}
