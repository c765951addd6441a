//! Change notification.
//!
//! Subscribers register a callback per key and receive the new entry
//! synchronously after every write. A [`Subscription`] is a scoped
//! acquisition: dropping it unsubscribes, so a callback can never outlive
//! its owner (component unmount, cancelled request).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::entry::CacheEntry;
use super::keys::QueryKey;
use super::lock::{read_guard, write_guard};

pub(crate) type SubscriberFn = Arc<dyn Fn(&CacheEntry) + Send + Sync>;

/// Per-key subscriber table. Notification is synchronous; callbacks are
/// invoked outside the table lock so they may read the cache freely.
pub(crate) struct SubscriberRegistry {
    subscribers: RwLock<HashMap<QueryKey, HashMap<u64, SubscriberFn>>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn add(&self, key: QueryKey, callback: SubscriberFn) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        write_guard(&self.subscribers, "subscribe")
            .entry(key)
            .or_default()
            .insert(id, callback);
        id
    }

    pub(crate) fn remove(&self, key: &QueryKey, id: u64) {
        let mut table = write_guard(&self.subscribers, "unsubscribe");
        if let Some(entries) = table.get_mut(key) {
            entries.remove(&id);
            if entries.is_empty() {
                table.remove(key);
            }
        }
    }

    pub(crate) fn notify(&self, entry: &CacheEntry) {
        let callbacks: Vec<SubscriberFn> = {
            let table = read_guard(&self.subscribers, "notify");
            match table.get(&entry.key) {
                Some(entries) => entries.values().cloned().collect(),
                None => return,
            }
        };
        debug!(
            key = %entry.key.label(),
            subscriber_count = callbacks.len(),
            "Notifying cache subscribers"
        );
        for callback in callbacks {
            callback(entry);
        }
    }

    pub(crate) fn count(&self, key: &QueryKey) -> usize {
        read_guard(&self.subscribers, "subscriber_count")
            .get(key)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

/// RAII handle for a cache subscription.
///
/// Unsubscribes on drop, so the callback is released on every exit path
/// of its owner.
pub struct Subscription {
    pub(crate) registry: Arc<SubscriberRegistry>,
    pub(crate) key: QueryKey,
    pub(crate) id: u64,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(&self.key, self.id);
    }
}
