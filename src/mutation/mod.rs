//! The optimistic mutation engine.
//!
//! A mutation is described once ([`MutationDescriptor`]), then run by the
//! [`MutationCoordinator`] through a fixed lifecycle: snapshot, optimistic
//! apply, commit, reconcile or rollback, and a settlement step that always
//! runs. Mutations targeting the same key are serialized; distinct keys
//! proceed independently.

mod coordinator;
mod descriptor;
mod error;

pub use coordinator::{MutationCoordinator, MutationPhase};
pub use descriptor::{CommitFn, MutationDescriptor, ReconcileFn};
pub use error::MutationError;
