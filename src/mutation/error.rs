//! The error taxonomy a mutation can settle with.
//!
//! Every kind triggers rollback. Only `Conflict` additionally forces an
//! immediate refetch of the target key; the others rely on passive
//! staleness. None are retried automatically; a retry is a user-initiated
//! re-submission.

use thiserror::Error;

use crate::remote::{RemoteError, RemoteErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("network failure during commit: {0}")]
    Network(String),
    #[error("remote state conflict: {0}")]
    Conflict(String),
    #[error("payload rejected by remote: {0}")]
    Validation(String),
}

impl MutationError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, MutationError::Conflict(_))
    }

    /// Stable label for metrics and logs.
    pub fn kind_label(&self) -> &'static str {
        match self {
            MutationError::Network(_) => "network",
            MutationError::Conflict(_) => "conflict",
            MutationError::Validation(_) => "validation",
        }
    }
}

impl From<RemoteError> for MutationError {
    fn from(error: RemoteError) -> Self {
        match error.kind {
            RemoteErrorKind::Network => MutationError::Network(error.message),
            RemoteErrorKind::Conflict => MutationError::Conflict(error.message),
            RemoteErrorKind::Validation => MutationError::Validation(error.message),
        }
    }
}
