//! The mutation coordinator.
//!
//! Runs one [`MutationDescriptor`] through the optimistic lifecycle:
//!
//! - **Applying**: snapshot the current entry, write the optimistic value.
//! - **Committing**: await the remote call (the only suspension point).
//! - **Success**: write `reconcile(snapshot, result)`, mark dependents stale.
//! - **Failed**: restore the snapshot exactly, classify the error; a
//!   conflict additionally forces an immediate refetch of the key.
//! - **Settled**: always runs, via a drop guard, even if reconcile panics.
//!
//! Mutations on the same key are queued on a per-key lane and never
//! interleave; a later mutation's optimistic apply happens strictly after
//! the earlier one has fully settled. Distinct keys run independently.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use metrics::{counter, histogram};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{QueryCache, QueryKey, QueryStatus};
use crate::remote::ServerResult;

use super::descriptor::MutationDescriptor;
use super::error::MutationError;

const METRIC_COMMIT_MS: &str = "bottega_mutation_commit_ms";
const METRIC_SUCCESS: &str = "bottega_mutation_success_total";
const METRIC_ROLLBACK: &str = "bottega_mutation_rollback_total";
const METRIC_SETTLED: &str = "bottega_mutation_settled_total";

/// Lifecycle phase of a single mutation instance, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Applying,
    Committing,
    Success,
    Failed,
    Settled,
}

/// Orchestrates optimistic writes against the query cache.
pub struct MutationCoordinator {
    cache: Arc<QueryCache>,
    /// One fair FIFO lane per key; same-key mutations queue here in
    /// submission order.
    lanes: DashMap<QueryKey, Arc<Mutex<()>>>,
    epoch: AtomicU64,
}

/// Guaranteed settlement: re-marks the dependent keys stale and logs the
/// terminal phase when dropped, on every exit path.
struct SettleGuard {
    cache: Arc<QueryCache>,
    keys: Vec<QueryKey>,
    epoch: u64,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        for key in &self.keys {
            self.cache.mark_stale(key);
        }
        counter!(METRIC_SETTLED).increment(1);
        debug!(
            epoch = self.epoch,
            phase = ?MutationPhase::Settled,
            invalidated = self.keys.len(),
            "Mutation settled"
        );
    }
}

impl MutationCoordinator {
    pub fn new(cache: Arc<QueryCache>) -> Self {
        Self {
            cache,
            lanes: DashMap::new(),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Run a mutation to completion and return the server result.
    ///
    /// Atomic from the caller's perspective: the cache only ever exposes
    /// the snapshot value, the optimistic value, or the reconciled value.
    pub async fn run(&self, descriptor: MutationDescriptor) -> Result<ServerResult, MutationError> {
        let MutationDescriptor {
            target_key,
            optimistic,
            commit,
            reconcile,
            invalidates,
        } = descriptor;

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst);

        let lane = self
            .lanes
            .entry(target_key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        // Held for the whole lifecycle; the next queued mutation on this
        // key cannot snapshot until settlement has run (guard drops first).
        let _serial = lane.lock().await;

        let snapshot = self.cache.read(&target_key);
        let _settle = SettleGuard {
            cache: Arc::clone(&self.cache),
            keys: invalidates.clone(),
            epoch,
        };

        debug!(
            epoch,
            key = %target_key.label(),
            phase = ?MutationPhase::Applying,
            had_snapshot = snapshot.is_some(),
            "Optimistic value applied"
        );
        self.cache
            .write(&target_key, Some(optimistic), QueryStatus::Success);

        debug!(
            epoch,
            key = %target_key.label(),
            phase = ?MutationPhase::Committing,
            "Commit in flight"
        );
        let commit_started = Instant::now();
        let outcome = commit().await;
        histogram!(METRIC_COMMIT_MS).record(commit_started.elapsed().as_secs_f64() * 1_000.0);

        match outcome {
            Ok(result) => {
                let prior = snapshot.as_ref().and_then(|entry| entry.value.clone());
                let authoritative = reconcile(prior, result.clone());
                self.cache
                    .write(&target_key, Some(authoritative), QueryStatus::Success);
                for key in &invalidates {
                    self.cache.mark_stale(key);
                }
                counter!(METRIC_SUCCESS).increment(1);
                info!(
                    epoch,
                    key = %target_key.label(),
                    phase = ?MutationPhase::Success,
                    "Mutation committed"
                );
                Ok(result)
            }
            Err(remote) => {
                // Restore the exact snapshot, never a re-derived value.
                self.cache.restore(&target_key, snapshot);
                let error = MutationError::from(remote);
                if error.is_conflict() {
                    self.cache.force_refetch(&target_key);
                }
                counter!(METRIC_ROLLBACK, "kind" => error.kind_label()).increment(1);
                warn!(
                    epoch,
                    key = %target_key.label(),
                    phase = ?MutationPhase::Failed,
                    error = %error,
                    "Mutation rolled back"
                );
                Err(error)
            }
        }
    }
}
