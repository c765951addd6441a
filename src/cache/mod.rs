//! Bottega query cache.
//!
//! A process-wide keyed store mapping a [`QueryKey`] to the last known
//! value, freshness flags, and subscribers to notify on change. The cache
//! is the only shared mutable resource in the core; it is mutated through
//! coordinator-mediated writes or initial-load writes only, and every
//! method is a pure in-memory operation that cannot fail.

mod entry;
mod keys;
mod lock;
mod notify;
mod store;

pub use entry::{CacheEntry, CacheValue, QueryStatus};
pub use keys::QueryKey;
pub use notify::Subscription;
pub use store::QueryCache;
