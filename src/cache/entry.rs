//! Cache entry state.
//!
//! Staleness and forced refetch are deliberately two flags: `stale_after`
//! asks for a background refresh on the next observation, while
//! `refetch_forced` demands an immediate reload (set after a conflict).

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::cart::CartState;
use crate::domain::chat::ChatThread;

use super::keys::QueryKey;

/// Lifecycle status of a cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Typed union of values the cache can hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CacheValue {
    Cart(CartState),
    Chat(ChatThread),
}

impl CacheValue {
    pub fn as_cart(&self) -> Option<&CartState> {
        match self {
            CacheValue::Cart(cart) => Some(cart),
            CacheValue::Chat(_) => None,
        }
    }

    pub fn as_chat(&self) -> Option<&ChatThread> {
        match self {
            CacheValue::Chat(thread) => Some(thread),
            CacheValue::Cart(_) => None,
        }
    }
}

/// One cache slot: last known value plus freshness bookkeeping.
///
/// Owned exclusively by the cache; domain services never mutate entries
/// directly, only through [`super::QueryCache`] operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub key: QueryKey,
    pub value: Option<CacheValue>,
    pub status: QueryStatus,
    pub updated_at: OffsetDateTime,
    pub stale_after: Option<OffsetDateTime>,
    pub refetch_forced: bool,
}

impl CacheEntry {
    /// A slot that holds nothing; what subscribers observe after a key is
    /// removed.
    pub fn vacant(key: QueryKey) -> Self {
        Self {
            key,
            value: None,
            status: QueryStatus::Idle,
            updated_at: OffsetDateTime::now_utc(),
            stale_after: None,
            refetch_forced: false,
        }
    }

    /// Whether the entry should be refreshed in the background.
    ///
    /// True once the explicit stale marker has passed, or once the entry is
    /// older than the passive horizon.
    pub fn is_stale(&self, now: OffsetDateTime, horizon: std::time::Duration) -> bool {
        if let Some(stale_after) = self.stale_after {
            if now >= stale_after {
                return true;
            }
        }
        now >= self.updated_at + horizon
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }
}
