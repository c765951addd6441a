//! The query cache store.
//!
//! One map from [`QueryKey`] to [`CacheEntry`] plus subscriber
//! notification. Writes are synchronous; a subscriber observing the cache
//! right after a write sees the written value (no stale reads from a
//! writer's perspective). The store performs no remote calls; staleness
//! flags only signal that callers should refetch.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use metrics::counter;
use time::OffsetDateTime;
use tracing::debug;

use super::entry::{CacheEntry, CacheValue, QueryStatus};
use super::keys::QueryKey;
use super::lock::{read_guard, write_guard};
use super::notify::{SubscriberRegistry, Subscription};

const METRIC_CACHE_HIT: &str = "bottega_cache_hit_total";
const METRIC_CACHE_MISS: &str = "bottega_cache_miss_total";

/// Process-wide keyed store for storefront state.
///
/// Constructed once per application session (injectable, no hidden
/// singleton) and torn down on logout via [`QueryCache::clear`].
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
    subscribers: Arc<SubscriberRegistry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            subscribers: Arc::new(SubscriberRegistry::new()),
        }
    }

    /// Current entry for a key, if any. Never blocks on I/O.
    pub fn read(&self, key: &QueryKey) -> Option<CacheEntry> {
        let entry = read_guard(&self.entries, "read").get(key).cloned();
        match entry {
            Some(_) => counter!(METRIC_CACHE_HIT, "key" => key.label()).increment(1),
            None => counter!(METRIC_CACHE_MISS, "key" => key.label()).increment(1),
        }
        entry
    }

    /// Replace a slot's value and status, clearing freshness flags, and
    /// notify subscribers synchronously.
    pub fn write(&self, key: &QueryKey, value: Option<CacheValue>, status: QueryStatus) {
        let entry = CacheEntry {
            key: key.clone(),
            value,
            status,
            updated_at: OffsetDateTime::now_utc(),
            stale_after: None,
            refetch_forced: false,
        };
        write_guard(&self.entries, "write").insert(key.clone(), entry.clone());
        debug!(key = %key.label(), status = ?status, "Cache write");
        self.subscribers.notify(&entry);
    }

    /// Update only the status of a slot, preserving value and freshness.
    ///
    /// Creates a vacant entry if the key is unknown (the loading state of a
    /// never-fetched resource).
    pub fn set_status(&self, key: &QueryKey, status: QueryStatus) {
        let entry = {
            let mut entries = write_guard(&self.entries, "set_status");
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::vacant(key.clone()));
            entry.status = status;
            entry.clone()
        };
        self.subscribers.notify(&entry);
    }

    /// Put back an exact prior entry state. The rollback path: `snapshot`
    /// is whatever [`QueryCache::read`] returned before the optimistic
    /// write, including `None` for an absent slot.
    pub fn restore(&self, key: &QueryKey, snapshot: Option<CacheEntry>) {
        match snapshot {
            Some(entry) => {
                write_guard(&self.entries, "restore").insert(key.clone(), entry.clone());
                debug!(key = %key.label(), "Cache restore from snapshot");
                self.subscribers.notify(&entry);
            }
            None => self.remove(key),
        }
    }

    /// Flag a slot for background refresh on its next observation.
    /// Does not trigger any fetch itself.
    pub fn mark_stale(&self, key: &QueryKey) {
        let mut entries = write_guard(&self.entries, "mark_stale");
        if let Some(entry) = entries.get_mut(key) {
            entry.stale_after = Some(OffsetDateTime::now_utc());
        }
    }

    /// Flag a slot for an immediate reload (conflict recovery).
    pub fn force_refetch(&self, key: &QueryKey) {
        let mut entries = write_guard(&self.entries, "force_refetch");
        if let Some(entry) = entries.get_mut(key) {
            entry.refetch_forced = true;
        }
    }

    /// Move a slot's contents to another key in one atomic step.
    ///
    /// Subscribers can never observe the value under both keys, nor under
    /// neither while a migration is in progress: the map is updated inside
    /// a single write-lock scope, then both keys are notified. Returns
    /// false if the source slot was absent (nothing moved).
    pub fn migrate(&self, from: &QueryKey, to: &QueryKey) -> bool {
        let moved = {
            let mut entries = write_guard(&self.entries, "migrate");
            let Some(source) = entries.remove(from) else {
                return false;
            };
            let entry = CacheEntry {
                key: to.clone(),
                value: source.value,
                status: source.status,
                updated_at: OffsetDateTime::now_utc(),
                stale_after: None,
                refetch_forced: false,
            };
            entries.insert(to.clone(), entry.clone());
            entry
        };
        debug!(from = %from.label(), to = %to.label(), "Cache slot migrated");
        self.subscribers.notify(&CacheEntry::vacant(from.clone()));
        self.subscribers.notify(&moved);
        true
    }

    /// Drop a slot entirely; subscribers observe a vacant entry.
    pub fn remove(&self, key: &QueryKey) {
        let removed = write_guard(&self.entries, "remove").remove(key).is_some();
        if removed {
            debug!(key = %key.label(), "Cache remove");
            self.subscribers.notify(&CacheEntry::vacant(key.clone()));
        }
    }

    /// Tear down all cached state (logout).
    pub fn clear(&self) {
        write_guard(&self.entries, "clear").clear();
    }

    /// Register a callback fired synchronously after every write to `key`.
    ///
    /// The returned [`Subscription`] unsubscribes when dropped.
    pub fn subscribe<F>(&self, key: QueryKey, callback: F) -> Subscription
    where
        F: Fn(&CacheEntry) + Send + Sync + 'static,
    {
        let id = self.subscribers.add(key.clone(), Arc::new(callback));
        Subscription {
            registry: Arc::clone(&self.subscribers),
            key,
            id,
        }
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.subscribers.count(key)
    }

    pub fn len(&self) -> usize {
        read_guard(&self.entries, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}
