//! Mutation descriptors.
//!
//! A descriptor captures everything the coordinator needs to run one
//! user-initiated write: the key it touches, the optimistic value to show
//! immediately, the remote commit, and the reconcile step that produces
//! the authoritative value from the pre-mutation snapshot and the server
//! result. Built fresh per invocation; immutable once submitted.

use futures::future::BoxFuture;

use crate::cache::{CacheValue, QueryKey};
use crate::remote::{RemoteError, ServerResult};

/// The remote call. Invoked exactly once, at the lifecycle's only
/// suspension point.
pub type CommitFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<ServerResult, RemoteError>> + Send>;

/// Merge step: pre-optimistic snapshot value plus server result in,
/// authoritative value out.
pub type ReconcileFn = Box<dyn FnOnce(Option<CacheValue>, ServerResult) -> CacheValue + Send>;

pub struct MutationDescriptor {
    pub target_key: QueryKey,
    pub optimistic: CacheValue,
    pub commit: CommitFn,
    pub reconcile: ReconcileFn,
    /// Keys re-marked stale at settlement. Defaults to the target key.
    pub invalidates: Vec<QueryKey>,
}

impl MutationDescriptor {
    pub fn new(
        target_key: QueryKey,
        optimistic: CacheValue,
        commit: CommitFn,
        reconcile: ReconcileFn,
    ) -> Self {
        let invalidates = vec![target_key.clone()];
        Self {
            target_key,
            optimistic,
            commit,
            reconcile,
            invalidates,
        }
    }

    /// Extend the set of keys invalidated after settlement.
    pub fn also_invalidates(mut self, key: QueryKey) -> Self {
        if !self.invalidates.contains(&key) {
            self.invalidates.push(key);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::cart::CartState;

    use super::*;

    fn noop_descriptor() -> MutationDescriptor {
        MutationDescriptor::new(
            QueryKey::Cart,
            CacheValue::Cart(CartState::default()),
            Box::new(|| Box::pin(async { Ok(ServerResult::Cart(CartState::default())) })),
            Box::new(|_prev, _result| CacheValue::Cart(CartState::default())),
        )
    }

    #[test]
    fn invalidates_target_by_default() {
        let descriptor = noop_descriptor();
        assert_eq!(descriptor.invalidates, vec![QueryKey::Cart]);
    }

    #[test]
    fn also_invalidates_deduplicates() {
        let descriptor = noop_descriptor()
            .also_invalidates(QueryKey::Cart)
            .also_invalidates(QueryKey::ChatDraft);
        assert_eq!(
            descriptor.invalidates,
            vec![QueryKey::Cart, QueryKey::ChatDraft]
        );
    }
}
