//! Poison-tolerant lock access for state shared between request handlers
//! and the reconnect loop.

use std::sync::{
    Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use tracing::warn;

fn recover<G>(poisoned: PoisonError<G>, source: &'static str, op: &'static str, kind: &str) -> G {
    warn!(
        target = "tutorium::cache::lock",
        source,
        op,
        kind,
        "Lock poisoned by a panicking holder; continuing with the inner value"
    );
    metrics::counter!("tutorium_lock_poison_recovered_total", "kind" => kind.to_string())
        .increment(1);
    poisoned.into_inner()
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read()
        .unwrap_or_else(|poisoned| recover(poisoned, source, op, "read"))
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write()
        .unwrap_or_else(|poisoned| recover(poisoned, source, op, "write"))
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    source: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock()
        .unwrap_or_else(|poisoned| recover(poisoned, source, op, "mutex"))
}
