//! Poison-tolerant lock acquisition for cache internals.
//!
//! Cache methods cannot fail, so a poisoned lock is recovered rather than
//! propagated; the recovery is logged with the operation that hit it.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn read_guard<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!(
            op,
            lock_kind = "rwlock.read",
            result = "poisoned_recovered",
            "Recovered from poisoned query-cache lock"
        );
        poisoned.into_inner()
    })
}

pub(crate) fn write_guard<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!(
            op,
            lock_kind = "rwlock.write",
            result = "poisoned_recovered",
            "Recovered from poisoned query-cache lock"
        );
        poisoned.into_inner()
    })
}
