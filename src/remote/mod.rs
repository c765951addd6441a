//! Boundary the core consumes: the remote store.
//!
//! The core does not care about transport. It needs endpoints that settle
//! with either a typed result or an error carrying a machine-readable
//! kind; timeouts are the implementation's concern and surface as
//! [`RemoteErrorKind::Network`].

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::cart::{CartItem, CartState, Cents};
use crate::domain::chat::{ChatMessage, ChatThread, ThreadId};

/// Machine-readable failure kinds reported by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Transport failed or timed out; safe to retry manually.
    Network,
    /// Server state changed incompatibly (e.g. item already removed).
    Conflict,
    /// Payload rejected; a caller-side fix is required.
    Validation,
}

#[derive(Debug, Clone, Error)]
#[error("remote store {kind:?}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Network,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Conflict,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Validation,
            message: message.into(),
        }
    }
}

/// Payload for the cart add endpoint. The name and unit price ride along
/// so the client can render the optimistic line; the server remains the
/// authority on what it stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartItem {
    pub product_id: u64,
    pub name: String,
    pub unit_price: Cents,
    pub quantity: u32,
}

/// Typed results a commit can settle with.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerResult {
    /// The server-assigned item created by an add.
    CartItem(CartItem),
    /// The authoritative cart after an update/remove/clear.
    Cart(CartState),
    /// Acknowledgement of a sent chat message.
    ChatAck {
        thread_id: ThreadId,
        message: ChatMessage,
        reply: ChatMessage,
    },
}

/// The remote store contract.
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn fetch_cart(&self) -> Result<CartState, RemoteError>;

    async fn add_cart_item(&self, item: NewCartItem) -> Result<ServerResult, RemoteError>;

    async fn update_cart_item(
        &self,
        item_id: Uuid,
        quantity: u32,
    ) -> Result<ServerResult, RemoteError>;

    async fn remove_cart_item(&self, item_id: Uuid) -> Result<ServerResult, RemoteError>;

    async fn clear_cart(&self) -> Result<ServerResult, RemoteError>;

    async fn fetch_thread(&self, thread_id: ThreadId) -> Result<ChatThread, RemoteError>;

    /// Send a message; with no `thread_id` the server allocates a thread.
    async fn send_message(
        &self,
        thread_id: Option<ThreadId>,
        body: String,
    ) -> Result<ServerResult, RemoteError>;
}
