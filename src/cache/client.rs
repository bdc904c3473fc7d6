//! Resilient remote cache client.
//!
//! Every public operation is infallible from the caller's point of view: when
//! the connection is not `Ready`, when the backend errors, or when the call
//! outlives the configured timeout, the operation logs, counts and returns a
//! safe fallback. Transport failures drop the connection and start a single
//! background reconnect loop with capped exponential backoff; once the attempt
//! budget is spent the client parks in `Failed` until [`CacheClient::reconnect`]
//! is called.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use metrics::{counter, gauge};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backend::{CacheConnection, CacheConnector, CacheError};
use super::config::CacheConfig;
use super::lock::{mutex_lock, rw_read, rw_write};

const SOURCE: &str = "cache::client";
const NEGATIVE_MARKER: &str = "null";

const METRIC_HIT: &str = "tutorium_cache_hit_total";
const METRIC_MISS: &str = "tutorium_cache_miss_total";
const METRIC_NEGATIVE_HIT: &str = "tutorium_cache_negative_hit_total";
const METRIC_FALLBACK: &str = "tutorium_cache_fallback_total";
const METRIC_RECONNECT: &str = "tutorium_cache_reconnect_total";
const METRIC_CONNECTED: &str = "tutorium_cache_connected";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    /// Reconnect attempts exhausted; only a manual reconnect leaves this state.
    Failed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a typed cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// Nothing cached (or the cache is unavailable).
    Miss,
    /// A negative entry: the item is known not to exist.
    Absent,
    Hit(T),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHealthReport {
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub state: ConnectionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheClientStats {
    pub backend: &'static str,
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub hits: u64,
    pub misses: u64,
    pub negative_hits: u64,
    pub fallbacks: u64,
    pub timeouts: u64,
    pub backend_keys: Option<u64>,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    negative_hits: AtomicU64,
    fallbacks: AtomicU64,
    timeouts: AtomicU64,
}

struct Inner {
    connector: Option<Arc<dyn CacheConnector>>,
    config: CacheConfig,
    state: RwLock<ConnectionState>,
    connection: tokio::sync::RwLock<Option<Arc<dyn CacheConnection>>>,
    attempts: AtomicU32,
    reconnecting: AtomicBool,
    closed: AtomicBool,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    counters: Counters,
}

/// Cheaply cloneable handle to the shared cache client.
#[derive(Clone)]
pub struct CacheClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheClient")
            .field("backend", &self.backend_name())
            .field("state", &self.state())
            .finish()
    }
}

impl CacheClient {
    pub fn new(connector: Arc<dyn CacheConnector>, config: CacheConfig) -> Self {
        Self::build(Some(connector), config)
    }

    /// A client without backend: every operation returns its fallback.
    pub fn disabled(config: CacheConfig) -> Self {
        Self::build(None, config)
    }

    fn build(connector: Option<Arc<dyn CacheConnector>>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                config,
                state: RwLock::new(ConnectionState::Disconnected),
                connection: tokio::sync::RwLock::new(None),
                attempts: AtomicU32::new(0),
                reconnecting: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                reconnect_task: Mutex::new(None),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner
            .connector
            .as_ref()
            .map(|connector| connector.name())
            .unwrap_or("disabled")
    }

    pub fn state(&self) -> ConnectionState {
        *rw_read(&self.inner.state, SOURCE, "state")
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Connect once; on failure leave a background reconnect loop running.
    pub async fn open(&self) -> ConnectionState {
        self.inner.closed.store(false, Ordering::SeqCst);
        if self.inner.connector.is_none() {
            info!(target = SOURCE, "Remote cache disabled; serving from the store only");
            return self.state();
        }
        self.establish().await
    }

    /// Manual intervention: reset the attempt budget and connect again.
    pub async fn reconnect(&self) -> ConnectionState {
        if self.inner.connector.is_none() {
            return self.state();
        }
        if self.inner.reconnecting.load(Ordering::SeqCst) {
            debug!(target = SOURCE, "Reconnect already in progress");
            return self.state();
        }
        self.inner.closed.store(false, Ordering::SeqCst);
        self.inner.attempts.store(0, Ordering::SeqCst);
        self.drop_connection().await;
        self.establish().await
    }

    /// Stop reconnecting and release the connection.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        if let Some(task) = mutex_lock(&self.inner.reconnect_task, SOURCE, "close").take() {
            task.abort();
        }
        self.inner.reconnecting.store(false, Ordering::SeqCst);
        self.drop_connection().await;
        info!(target = SOURCE, "Cache client closed");
    }

    async fn establish(&self) -> ConnectionState {
        let Some(connector) = self.inner.connector.clone() else {
            return self.state();
        };

        self.set_state(ConnectionState::Connecting);
        match tokio::time::timeout(self.inner.config.op_timeout, connector.connect()).await {
            Ok(Ok(connection)) => {
                self.install(connection).await;
                info!(target = SOURCE, backend = connector.name(), "Cache connection ready");
            }
            Ok(Err(err)) => {
                warn!(target = SOURCE, backend = connector.name(), error = %err, "Cache connection failed");
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
            Err(_) => {
                warn!(target = SOURCE, backend = connector.name(), "Cache connection timed out");
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
        }
        self.state()
    }

    async fn install(&self, connection: Arc<dyn CacheConnection>) {
        *self.inner.connection.write().await = Some(connection);
        self.inner.attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Ready);
        gauge!(METRIC_CONNECTED).set(1.0);
    }

    async fn drop_connection(&self) {
        self.inner.connection.write().await.take();
        self.set_state(ConnectionState::Disconnected);
        gauge!(METRIC_CONNECTED).set(0.0);
    }

    fn set_state(&self, state: ConnectionState) {
        *rw_write(&self.inner.state, SOURCE, "set_state") = state;
    }

    /// Start the reconnect loop unless one is running or the client is closed.
    fn schedule_reconnect(&self) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }
        if self
            .inner
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let client = self.clone();
        let task = tokio::spawn(async move {
            client.reconnect_loop().await;
            client.inner.reconnecting.store(false, Ordering::SeqCst);
        });
        *mutex_lock(&self.inner.reconnect_task, SOURCE, "schedule_reconnect") = Some(task);
    }

    async fn reconnect_loop(&self) {
        let Some(connector) = self.inner.connector.clone() else {
            return;
        };
        let config = &self.inner.config;

        loop {
            let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = config.backoff(attempt);
            debug!(
                target = SOURCE,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Scheduling cache reconnect"
            );
            tokio::time::sleep(delay).await;
            if self.inner.closed.load(Ordering::SeqCst) {
                return;
            }

            self.set_state(ConnectionState::Connecting);
            let outcome = tokio::time::timeout(config.op_timeout, connector.connect()).await;
            match outcome {
                Ok(Ok(connection)) => {
                    self.install(connection).await;
                    counter!(METRIC_RECONNECT, "outcome" => "success").increment(1);
                    info!(target = SOURCE, attempt, "Cache reconnected");
                    return;
                }
                Ok(Err(err)) => {
                    warn!(target = SOURCE, attempt, error = %err, "Cache reconnect attempt failed");
                }
                Err(_) => {
                    warn!(target = SOURCE, attempt, "Cache reconnect attempt timed out");
                }
            }
            counter!(METRIC_RECONNECT, "outcome" => "failure").increment(1);

            if attempt >= config.max_reconnect_attempts {
                self.set_state(ConnectionState::Failed);
                counter!(METRIC_RECONNECT, "outcome" => "exhausted").increment(1);
                warn!(
                    target = SOURCE,
                    attempts = attempt,
                    "Cache reconnect attempts exhausted; running without cache until manual reconnect"
                );
                return;
            }
            self.set_state(ConnectionState::Disconnected);
        }
    }

    async fn ready_connection(&self) -> Option<Arc<dyn CacheConnection>> {
        if !self.is_ready() {
            return None;
        }
        self.inner.connection.read().await.clone()
    }

    /// Run one backend call under the client's guarantees.
    async fn run<T, F, Fut>(&self, op: &'static str, fallback: T, call: F) -> T
    where
        F: FnOnce(Arc<dyn CacheConnection>) -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let Some(connection) = self.ready_connection().await else {
            self.record_fallback(op, "not_ready");
            return fallback;
        };

        match tokio::time::timeout(self.inner.config.op_timeout, call(connection)).await {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                warn!(target = SOURCE, op, error = %err, "Cache operation failed; using fallback");
                self.record_fallback(op, "error");
                if err.is_connection() {
                    self.on_transport_error().await;
                }
                fallback
            }
            Err(_) => {
                warn!(
                    target = SOURCE,
                    op,
                    timeout_ms = self.inner.config.op_timeout.as_millis() as u64,
                    "Cache operation timed out; using fallback"
                );
                self.inner.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                self.record_fallback(op, "timeout");
                fallback
            }
        }
    }

    async fn on_transport_error(&self) {
        if !self.is_ready() {
            return;
        }
        self.drop_connection().await;
        self.schedule_reconnect();
    }

    fn record_fallback(&self, op: &'static str, reason: &'static str) {
        self.inner.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_FALLBACK, "op" => op, "reason" => reason).increment(1);
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.run("get", None, |conn| async move { conn.get(key).await })
            .await
    }

    /// Typed read distinguishing "nothing cached" from a negative entry.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let counters = &self.inner.counters;
        let Some(raw) = self.get(key).await else {
            counters.misses.fetch_add(1, Ordering::Relaxed);
            counter!(METRIC_MISS).increment(1);
            return Lookup::Miss;
        };

        if raw.trim() == NEGATIVE_MARKER {
            counters.negative_hits.fetch_add(1, Ordering::Relaxed);
            counter!(METRIC_NEGATIVE_HIT).increment(1);
            return Lookup::Absent;
        }

        match serde_json::from_str(&raw) {
            Ok(value) => {
                counters.hits.fetch_add(1, Ordering::Relaxed);
                counter!(METRIC_HIT).increment(1);
                Lookup::Hit(value)
            }
            Err(err) => {
                warn!(target = SOURCE, key, error = %err, "Discarding undecodable cache entry");
                counters.misses.fetch_add(1, Ordering::Relaxed);
                counter!(METRIC_MISS).increment(1);
                Lookup::Miss
            }
        }
    }

    /// Store a JSON value. Values serializing to `null` are refused; use
    /// [`CacheClient::set_negative`] for absence markers.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target = SOURCE, key, error = %err, "Failed to encode cache value");
                return false;
            }
        };
        if payload == NEGATIVE_MARKER {
            debug!(target = SOURCE, key, "Refusing to cache a null value");
            return false;
        }

        self.run("set", false, |conn| async move {
            conn.set(key, &payload, ttl).await.map(|_| true)
        })
        .await
    }

    /// Record that `key` is known not to exist.
    pub async fn set_negative(&self, key: &str, ttl: Duration) -> bool {
        self.run("set_negative", false, |conn| async move {
            conn.set(key, NEGATIVE_MARKER, ttl).await.map(|_| true)
        })
        .await
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.run("delete", false, |conn| async move { conn.delete(key).await })
            .await
    }

    pub async fn increment(&self, key: &str, amount: i64) -> Option<i64> {
        self.run("increment", None, |conn| async move {
            conn.increment(key, amount).await.map(Some)
        })
        .await
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.run("exists", false, |conn| async move { conn.exists(key).await })
            .await
    }

    /// Values aligned with `keys`; all `None` when the cache is unavailable.
    pub async fn multi_get(&self, keys: &[String]) -> Vec<Option<String>> {
        if keys.is_empty() {
            return Vec::new();
        }
        let fallback = vec![None; keys.len()];
        let values = self
            .run("multi_get", fallback.clone(), |conn| async move {
                conn.multi_get(keys).await
            })
            .await;
        if values.len() == keys.len() {
            values
        } else {
            warn!(
                target = SOURCE,
                expected = keys.len(),
                got = values.len(),
                "Backend returned misaligned multi_get result"
            );
            fallback
        }
    }

    /// Store several values with one TTL. Entries serializing to `null` are
    /// skipped; returns `true` only if every remaining entry was written.
    pub async fn multi_set<T: Serialize>(&self, entries: &[(String, T)], ttl: Duration) -> bool {
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::to_string(value) {
                Ok(payload) if payload == NEGATIVE_MARKER => {
                    debug!(target = SOURCE, key = key.as_str(), "Skipping null value in multi_set");
                }
                Ok(payload) => encoded.push((key.clone(), payload)),
                Err(err) => {
                    warn!(target = SOURCE, key = key.as_str(), error = %err, "Failed to encode cache value");
                    return false;
                }
            }
        }
        if encoded.is_empty() {
            return true;
        }

        let encoded = &encoded;
        self.run("multi_set", false, |conn| async move {
            conn.multi_set(encoded, ttl).await.map(|_| true)
        })
        .await
    }

    pub async fn health_check(&self) -> CacheHealthReport {
        let started = Instant::now();
        let healthy = self
            .run("ping", false, |conn| async move { conn.ping().await.map(|_| true) })
            .await;
        CacheHealthReport {
            healthy,
            latency_ms: healthy.then(|| started.elapsed().as_millis() as u64),
            state: self.state(),
        }
    }

    /// Drop every key in the backend.
    pub async fn flush(&self) -> bool {
        let flushed = self
            .run("flush", false, |conn| async move { conn.flush().await.map(|_| true) })
            .await;
        if flushed {
            info!(target = SOURCE, "Remote cache flushed");
        }
        flushed
    }

    pub async fn stats(&self) -> CacheClientStats {
        let backend_keys = if self.is_ready() {
            self.run("key_count", None, |conn| async move {
                conn.key_count().await.map(Some)
            })
            .await
        } else {
            None
        };
        let counters = &self.inner.counters;
        CacheClientStats {
            backend: self.backend_name(),
            state: self.state(),
            reconnect_attempts: self.inner.attempts.load(Ordering::SeqCst),
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            negative_hits: counters.negative_hits.load(Ordering::Relaxed),
            fallbacks: counters.fallbacks.load(Ordering::Relaxed),
            timeouts: counters.timeouts.load(Ordering::Relaxed),
            backend_keys,
        }
    }
}
