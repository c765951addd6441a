//! Cache key definitions.
//!
//! A `QueryKey` identifies one cache slot. Equality is structural: two
//! keys address the same slot iff they compare equal.

use serde::Serialize;

use crate::domain::chat::ThreadId;

/// Structural identity of a cached resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKey {
    /// The authenticated session's cart (one logical resource per user).
    Cart,
    /// A support conversation with a server-allocated identity.
    ChatThread(ThreadId),
    /// Provisional slot for a conversation the server has not named yet.
    ChatDraft,
}

impl QueryKey {
    /// Stable textual form used in logs and metrics labels.
    pub fn label(&self) -> String {
        match self {
            QueryKey::Cart => "cart".to_string(),
            QueryKey::ChatThread(id) => format!("chat:{id}"),
            QueryKey::ChatDraft => "chat:draft".to_string(),
        }
    }
}
