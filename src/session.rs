//! Durable identity store.
//!
//! A minimal get/set capability that survives a full reload (browser local
//! storage, a settings file, whatever the host provides). The core only
//! persists the adopted chat thread id here. Absence is the only failure
//! mode.

use std::collections::HashMap;
use std::sync::RwLock;

/// Synchronous key-value persistence boundary.
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory implementation for tests and single-process hosts.
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_remove_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("chat.thread_id").is_none());

        store.set("chat.thread_id", "abc");
        assert_eq!(store.get("chat.thread_id").as_deref(), Some("abc"));

        store.remove("chat.thread_id");
        assert!(store.get("chat.thread_id").is_none());
    }

    #[test]
    fn set_overwrites() {
        let store = MemoryStore::new();
        store.set("k", "one");
        store.set("k", "two");
        assert_eq!(store.get("k").as_deref(), Some("two"));
    }
}
