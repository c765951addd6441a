//! Cart line items and the totals derived from them.
//!
//! Money is integer minor units (cents). Subtotal, shipping, and total are
//! pure functions over the current line items and are recomputed on every
//! read; they are never cached alongside the items.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monetary amount in minor units (e.g. cents).
pub type Cents = i64;

/// A single cart line.
///
/// `synthetic` marks a client-generated placeholder written optimistically
/// before the server has assigned the authoritative item. Reconciliation
/// replaces synthetic lines with server items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: u64,
    pub name: String,
    pub unit_price: Cents,
    pub quantity: u32,
    #[serde(default)]
    pub synthetic: bool,
}

impl CartItem {
    /// Build a synthetic line with a fresh client-side id.
    pub fn synthetic(product_id: u64, name: impl Into<String>, unit_price: Cents, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            name: name.into(),
            unit_price,
            quantity,
            synthetic: true,
        }
    }

    pub fn line_total(&self) -> Cents {
        self.unit_price * Cents::from(self.quantity)
    }
}

/// The full cart value cached under `QueryKey::Cart`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    pub items: Vec<CartItem>,
}

impl CartState {
    pub fn subtotal(&self) -> Cents {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace the line matching the server item's product, or append it.
    ///
    /// Used by reconcile: the pre-optimistic snapshot never contains the
    /// synthetic line, so the server item lands exactly once.
    pub fn upsert(&mut self, item: CartItem) {
        match self
            .items
            .iter_mut()
            .find(|existing| existing.product_id == item.product_id)
        {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    pub fn without_item(&self, item_id: Uuid) -> Self {
        Self {
            items: self
                .items
                .iter()
                .filter(|item| item.id != item_id)
                .cloned()
                .collect(),
        }
    }

    pub fn with_quantity(&self, item_id: Uuid, quantity: u32) -> Self {
        Self {
            items: self
                .items
                .iter()
                .map(|item| {
                    if item.id == item_id {
                        let mut updated = item.clone();
                        updated.quantity = quantity;
                        updated
                    } else {
                        item.clone()
                    }
                })
                .collect(),
        }
    }
}

/// Shipping cost for a subtotal: free at or above the threshold, otherwise
/// a flat fee. Pure function, evaluated on every read.
pub fn shipping_for(subtotal: Cents, free_threshold: Cents, flat_fee: Cents) -> Cents {
    if subtotal >= free_threshold { 0 } else { flat_fee }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: u64, unit_price: Cents, quantity: u32) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            product_id,
            name: format!("product-{product_id}"),
            unit_price,
            quantity,
            synthetic: false,
        }
    }

    #[test]
    fn subtotal_and_count() {
        let cart = CartState {
            items: vec![line(1, 2_500, 2), line(2, 999, 1)],
        };
        assert_eq!(cart.subtotal(), 5_999);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn shipping_threshold_boundary() {
        // 149.99 pays the flat fee, 150.00 ships free.
        assert_eq!(shipping_for(14_999, 15_000, 1_000), 1_000);
        assert_eq!(shipping_for(15_000, 15_000, 1_000), 0);
        assert_eq!(shipping_for(15_001, 15_000, 1_000), 0);
    }

    #[test]
    fn upsert_replaces_matching_product() {
        let mut cart = CartState {
            items: vec![line(7, 100, 1)],
        };
        let server_item = line(7, 100, 3);
        cart.upsert(server_item.clone());
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0], server_item);
    }

    #[test]
    fn upsert_appends_new_product() {
        let mut cart = CartState::default();
        cart.upsert(line(9, 450, 1));
        assert_eq!(cart.items.len(), 1);
    }

    #[test]
    fn without_item_strips_only_target() {
        let keep = line(1, 100, 1);
        let drop = line(2, 200, 1);
        let cart = CartState {
            items: vec![keep.clone(), drop.clone()],
        };
        let stripped = cart.without_item(drop.id);
        assert_eq!(stripped.items, vec![keep]);
    }

    #[test]
    fn with_quantity_updates_target_line() {
        let item = line(1, 100, 1);
        let cart = CartState {
            items: vec![item.clone()],
        };
        let updated = cart.with_quantity(item.id, 5);
        assert_eq!(updated.items[0].quantity, 5);
        assert_eq!(updated.subtotal(), 500);
    }

    #[test]
    fn synthetic_lines_are_marked() {
        let item = CartItem::synthetic(42, "Lamp", 1_999, 2);
        assert!(item.synthetic);
        assert_eq!(item.line_total(), 3_998);
    }
}
