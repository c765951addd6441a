//! Cart service.
//!
//! Translates add/update/remove/clear intents into mutation descriptors
//! against [`QueryKey::Cart`]. Subtotal, shipping, total, and item count
//! are recomputed from the cached items on every [`CartService::view`]
//! call; they are never stored, so line items and totals cannot drift
//! apart.

use std::sync::{Arc, Mutex};

use tracing::instrument;
use uuid::Uuid;

use crate::cache::{CacheValue, QueryCache, QueryKey, QueryStatus};
use crate::config::CoreConfig;
use crate::domain::cart::{CartItem, CartState, Cents, shipping_for};
use crate::mutation::{CommitFn, MutationCoordinator, MutationDescriptor, MutationError, ReconcileFn};
use crate::remote::{NewCartItem, ServerResult, StoreClient};

/// Read-only snapshot handed to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub subtotal: Cents,
    pub shipping: Cents,
    pub total: Cents,
    pub item_count: u32,
    pub is_loading: bool,
    pub error: Option<MutationError>,
}

pub struct CartService {
    cache: Arc<QueryCache>,
    coordinator: Arc<MutationCoordinator>,
    client: Arc<dyn StoreClient>,
    config: CoreConfig,
    last_error: Mutex<Option<MutationError>>,
}

/// Authoritative cart from a commit result, folded onto the pre-mutation
/// snapshot. An add returns the single server item; the other endpoints
/// return the whole cart.
fn reconcile_cart(prev: Option<CacheValue>, result: ServerResult) -> CacheValue {
    let mut cart = match prev {
        Some(CacheValue::Cart(cart)) => cart,
        _ => CartState::default(),
    };
    match result {
        ServerResult::Cart(cart) => CacheValue::Cart(cart),
        ServerResult::CartItem(item) => {
            cart.upsert(item);
            CacheValue::Cart(cart)
        }
        ServerResult::ChatAck { .. } => CacheValue::Cart(cart),
    }
}

impl CartService {
    pub fn new(
        cache: Arc<QueryCache>,
        coordinator: Arc<MutationCoordinator>,
        client: Arc<dyn StoreClient>,
        config: CoreConfig,
    ) -> Self {
        Self {
            cache,
            coordinator,
            client,
            config,
            last_error: Mutex::new(None),
        }
    }

    fn current(&self) -> CartState {
        match self.cache.read(&QueryKey::Cart).and_then(|entry| entry.value) {
            Some(CacheValue::Cart(cart)) => cart,
            _ => CartState::default(),
        }
    }

    fn record_error(&self, error: Option<MutationError>) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = error;
    }

    /// Initial fetch of the cart into the cache.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<(), MutationError> {
        self.cache.set_status(&QueryKey::Cart, QueryStatus::Loading);
        match self.client.fetch_cart().await {
            Ok(cart) => {
                // A reload never clears a surfaced mutation error; only the
                // next successful action does.
                self.cache
                    .write(&QueryKey::Cart, Some(CacheValue::Cart(cart)), QueryStatus::Success);
                Ok(())
            }
            Err(remote) => {
                self.cache.set_status(&QueryKey::Cart, QueryStatus::Error);
                let error = MutationError::from(remote);
                self.record_error(Some(error.clone()));
                Err(error)
            }
        }
    }

    /// Reload when the entry is absent, flagged for forced refetch, or
    /// past its staleness horizon.
    pub async fn refresh_if_needed(&self) -> Result<(), MutationError> {
        let needs_reload = match self.cache.read(&QueryKey::Cart) {
            None => true,
            Some(entry) => {
                entry.value.is_none()
                    || entry.refetch_forced
                    || entry.is_stale(time::OffsetDateTime::now_utc(), self.config.stale_horizon())
            }
        };
        if needs_reload { self.load().await } else { Ok(()) }
    }

    async fn run(&self, descriptor: MutationDescriptor) -> Result<(), MutationError> {
        match self.coordinator.run(descriptor).await {
            Ok(_) => {
                self.record_error(None);
                Ok(())
            }
            Err(error) => {
                self.record_error(Some(error.clone()));
                if error.is_conflict() {
                    // Stale optimistic state: reload now instead of waiting
                    // for the next observation.
                    let _ = self.load().await;
                }
                Err(error)
            }
        }
    }

    /// Add a product. The optimistic value shows a synthetic line until
    /// reconcile replaces it with the server-assigned item.
    #[instrument(skip(self, name))]
    pub async fn add_item(
        &self,
        product_id: u64,
        name: &str,
        unit_price: Cents,
        quantity: u32,
    ) -> Result<(), MutationError> {
        let mut optimistic = self.current();
        optimistic
            .items
            .push(CartItem::synthetic(product_id, name, unit_price, quantity));

        let client = Arc::clone(&self.client);
        let payload = NewCartItem {
            product_id,
            name: name.to_string(),
            unit_price,
            quantity,
        };
        let commit: CommitFn =
            Box::new(move || Box::pin(async move { client.add_cart_item(payload).await }));
        let reconcile: ReconcileFn = Box::new(reconcile_cart);

        self.run(MutationDescriptor::new(
            QueryKey::Cart,
            CacheValue::Cart(optimistic),
            commit,
            reconcile,
        ))
        .await
    }

    /// Change a line's quantity. A quantity of zero or less removes the
    /// item instead of sending a non-positive quantity to the server.
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, item_id: Uuid, quantity: i64) -> Result<(), MutationError> {
        if quantity <= 0 {
            return self.remove_item(item_id).await;
        }
        let quantity = match u32::try_from(quantity) {
            Ok(quantity) => quantity,
            Err(_) => {
                let error = MutationError::Validation(format!(
                    "quantity {quantity} exceeds the supported range"
                ));
                self.record_error(Some(error.clone()));
                return Err(error);
            }
        };
        let optimistic = self.current().with_quantity(item_id, quantity);

        let client = Arc::clone(&self.client);
        let commit: CommitFn = Box::new(move || {
            Box::pin(async move { client.update_cart_item(item_id, quantity).await })
        });
        let reconcile: ReconcileFn = Box::new(reconcile_cart);

        self.run(MutationDescriptor::new(
            QueryKey::Cart,
            CacheValue::Cart(optimistic),
            commit,
            reconcile,
        ))
        .await
    }

    /// Remove a line; the optimistic value strips it immediately.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, item_id: Uuid) -> Result<(), MutationError> {
        let optimistic = self.current().without_item(item_id);

        let client = Arc::clone(&self.client);
        let commit: CommitFn =
            Box::new(move || Box::pin(async move { client.remove_cart_item(item_id).await }));
        let reconcile: ReconcileFn = Box::new(reconcile_cart);

        self.run(MutationDescriptor::new(
            QueryKey::Cart,
            CacheValue::Cart(optimistic),
            commit,
            reconcile,
        ))
        .await
    }

    /// Empty the cart.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), MutationError> {
        let client = Arc::clone(&self.client);
        let commit: CommitFn = Box::new(move || Box::pin(async move { client.clear_cart().await }));
        let reconcile: ReconcileFn = Box::new(reconcile_cart);

        self.run(MutationDescriptor::new(
            QueryKey::Cart,
            CacheValue::Cart(CartState::default()),
            commit,
            reconcile,
        ))
        .await
    }

    /// Derived view over the current cache value. Pure: every total is a
    /// function of the line items and the shipping policy.
    pub fn view(&self) -> CartView {
        let entry = self.cache.read(&QueryKey::Cart);
        let is_loading = entry.as_ref().is_some_and(|entry| entry.is_loading());
        let cart = match entry.and_then(|entry| entry.value) {
            Some(CacheValue::Cart(cart)) => cart,
            _ => CartState::default(),
        };
        let subtotal = cart.subtotal();
        let shipping = shipping_for(
            subtotal,
            self.config.free_shipping_threshold,
            self.config.flat_shipping_fee,
        );
        CartView {
            item_count: cart.item_count(),
            items: cart.items,
            subtotal,
            shipping,
            total: subtotal + shipping,
            is_loading,
            error: self
                .last_error
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
        }
    }
}
