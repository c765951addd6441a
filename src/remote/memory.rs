//! In-memory reference implementation of the remote store.
//!
//! Holds the server-side truth for one session, with injectable latency
//! and scripted failures, so integration tests and demos can exercise the
//! full optimistic lifecycle without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::cart::{CartItem, CartState};
use crate::domain::chat::{ChatMessage, ChatThread, MessageRole, ThreadId};

use super::{NewCartItem, RemoteError, RemoteErrorKind, ServerResult, StoreClient};

pub struct InMemoryStoreClient {
    cart: Mutex<CartState>,
    threads: Mutex<HashMap<ThreadId, ChatThread>>,
    scripted_failures: Mutex<VecDeque<RemoteErrorKind>>,
    latency: Mutex<Duration>,
}

fn guard<'a, T>(lock: &'a Mutex<T>) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryStoreClient {
    pub fn new() -> Self {
        Self {
            cart: Mutex::new(CartState::default()),
            threads: Mutex::new(HashMap::new()),
            scripted_failures: Mutex::new(VecDeque::new()),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Queue a failure for the next endpoint call (FIFO).
    pub fn fail_next(&self, kind: RemoteErrorKind) {
        guard(&self.scripted_failures).push_back(kind);
    }

    /// Simulated network latency applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        *guard(&self.latency) = latency;
    }

    /// Replace the server-side cart (test fixture).
    pub fn seed_cart(&self, cart: CartState) {
        *guard(&self.cart) = cart;
    }

    /// Server-side view of a thread (test assertions).
    pub fn server_thread(&self, thread_id: ThreadId) -> Option<ChatThread> {
        guard(&self.threads).get(&thread_id).cloned()
    }

    async fn settle(&self, endpoint: &'static str) -> Result<(), RemoteError> {
        let latency = *guard(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match guard(&self.scripted_failures).pop_front() {
            Some(RemoteErrorKind::Network) => {
                Err(RemoteError::network(format!("{endpoint}: connection reset")))
            }
            Some(RemoteErrorKind::Conflict) => Err(RemoteError::conflict(format!(
                "{endpoint}: resource changed on the server"
            ))),
            Some(RemoteErrorKind::Validation) => Err(RemoteError::validation(format!(
                "{endpoint}: payload rejected"
            ))),
            None => Ok(()),
        }
    }

    fn assistant_reply(body: &str) -> String {
        let _ = body;
        "Thanks for reaching out. A member of our team is looking into it now.".to_string()
    }
}

impl Default for InMemoryStoreClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreClient for InMemoryStoreClient {
    async fn fetch_cart(&self) -> Result<CartState, RemoteError> {
        self.settle("fetch_cart").await?;
        Ok(guard(&self.cart).clone())
    }

    async fn add_cart_item(&self, item: NewCartItem) -> Result<ServerResult, RemoteError> {
        self.settle("add_cart_item").await?;
        if item.quantity == 0 {
            return Err(RemoteError::validation("add_cart_item: zero quantity"));
        }
        let mut cart = guard(&self.cart);
        let stored = match cart
            .items
            .iter_mut()
            .find(|existing| existing.product_id == item.product_id)
        {
            // Re-adding an existing product merges quantities server-side.
            Some(existing) => {
                existing.quantity += item.quantity;
                existing.clone()
            }
            None => {
                let stored = CartItem {
                    id: Uuid::new_v4(),
                    product_id: item.product_id,
                    name: item.name,
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                    synthetic: false,
                };
                cart.items.push(stored.clone());
                stored
            }
        };
        Ok(ServerResult::CartItem(stored))
    }

    async fn update_cart_item(
        &self,
        item_id: Uuid,
        quantity: u32,
    ) -> Result<ServerResult, RemoteError> {
        self.settle("update_cart_item").await?;
        if quantity == 0 {
            return Err(RemoteError::validation("update_cart_item: zero quantity"));
        }
        let mut cart = guard(&self.cart);
        let item = cart
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| RemoteError::conflict("update_cart_item: item already removed"))?;
        item.quantity = quantity;
        Ok(ServerResult::Cart(cart.clone()))
    }

    async fn remove_cart_item(&self, item_id: Uuid) -> Result<ServerResult, RemoteError> {
        self.settle("remove_cart_item").await?;
        let mut cart = guard(&self.cart);
        let before = cart.items.len();
        cart.items.retain(|item| item.id != item_id);
        if cart.items.len() == before {
            return Err(RemoteError::conflict("remove_cart_item: item already removed"));
        }
        Ok(ServerResult::Cart(cart.clone()))
    }

    async fn clear_cart(&self) -> Result<ServerResult, RemoteError> {
        self.settle("clear_cart").await?;
        let mut cart = guard(&self.cart);
        cart.items.clear();
        Ok(ServerResult::Cart(cart.clone()))
    }

    async fn fetch_thread(&self, thread_id: ThreadId) -> Result<ChatThread, RemoteError> {
        self.settle("fetch_thread").await?;
        Ok(guard(&self.threads)
            .get(&thread_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        thread_id: Option<ThreadId>,
        body: String,
    ) -> Result<ServerResult, RemoteError> {
        self.settle("send_message").await?;
        if body.trim().is_empty() {
            return Err(RemoteError::validation("send_message: empty body"));
        }
        let thread_id = thread_id.unwrap_or_else(|| ThreadId(Uuid::new_v4()));
        let message = ChatMessage {
            id: Uuid::new_v4(),
            role: MessageRole::User,
            body: body.clone(),
            sent_at: OffsetDateTime::now_utc(),
            pending: false,
        };
        let reply = ChatMessage {
            id: Uuid::new_v4(),
            role: MessageRole::Assistant,
            body: Self::assistant_reply(&body),
            sent_at: OffsetDateTime::now_utc(),
            pending: false,
        };
        let mut threads = guard(&self.threads);
        let thread = threads.entry(thread_id).or_default();
        thread.messages.push(message.clone());
        thread.messages.push(reply.clone());
        Ok(ServerResult::ChatAck {
            thread_id,
            message,
            reply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_item(product_id: u64, quantity: u32) -> NewCartItem {
        NewCartItem {
            product_id,
            name: format!("product-{product_id}"),
            unit_price: 2_500,
            quantity,
        }
    }

    #[tokio::test]
    async fn add_assigns_server_id() {
        let client = InMemoryStoreClient::new();
        let result = client.add_cart_item(new_item(42, 2)).await.expect("add");
        let ServerResult::CartItem(item) = result else {
            panic!("expected cart item");
        };
        assert_eq!(item.product_id, 42);
        assert_eq!(item.quantity, 2);
        assert!(!item.synthetic);
    }

    #[tokio::test]
    async fn re_adding_merges_quantity() {
        let client = InMemoryStoreClient::new();
        client.add_cart_item(new_item(42, 1)).await.expect("add");
        let result = client.add_cart_item(new_item(42, 2)).await.expect("add");
        let ServerResult::CartItem(item) = result else {
            panic!("expected cart item");
        };
        assert_eq!(item.quantity, 3);
        assert_eq!(client.fetch_cart().await.expect("cart").items.len(), 1);
    }

    #[tokio::test]
    async fn update_missing_item_is_a_conflict() {
        let client = InMemoryStoreClient::new();
        let error = client
            .update_cart_item(Uuid::new_v4(), 2)
            .await
            .expect_err("missing item");
        assert_eq!(error.kind, RemoteErrorKind::Conflict);
    }

    #[tokio::test]
    async fn scripted_failures_fire_in_order() {
        let client = InMemoryStoreClient::new();
        client.fail_next(RemoteErrorKind::Network);
        client.fail_next(RemoteErrorKind::Validation);

        let first = client.fetch_cart().await.expect_err("scripted");
        assert_eq!(first.kind, RemoteErrorKind::Network);
        let second = client.fetch_cart().await.expect_err("scripted");
        assert_eq!(second.kind, RemoteErrorKind::Validation);
        assert!(client.fetch_cart().await.is_ok());
    }

    #[tokio::test]
    async fn send_message_allocates_thread_and_replies() {
        let client = InMemoryStoreClient::new();
        let result = client
            .send_message(None, "where is my order?".to_string())
            .await
            .expect("send");
        let ServerResult::ChatAck {
            thread_id,
            message,
            reply,
        } = result
        else {
            panic!("expected chat ack");
        };
        assert_eq!(message.role, MessageRole::User);
        assert_eq!(reply.role, MessageRole::Assistant);

        let thread = client.server_thread(thread_id).expect("server thread");
        assert_eq!(thread.len(), 2);
    }
}
