//! Persistent shopping cart.
//!
//! The cart is an ordered list of line items, unique by product id. Every
//! mutation writes the whole list to durable storage under
//! [`keys::CART`](crate::storage::keys::CART). Storage failures are logged
//! and never surface to the caller; the in-memory cart stays authoritative.
//!
//! Totals are computed from the line items on every read.

mod line;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;
use shopdesk_core::ProductId;

pub use line::{CartLineItem, ProductSnapshot};

use crate::error::add_breadcrumb;
use crate::storage::{KeyValueStore, keys};

/// The browsing session's cart.
pub struct Cart {
    storage: Arc<dyn KeyValueStore>,
    items: Vec<CartLineItem>,
}

impl Cart {
    /// Hydrate the cart from `storage`, starting empty when nothing usable is
    /// stored.
    #[must_use]
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let items = hydrate(storage.as_ref());
        Self { storage, items }
    }

    /// Re-read the stored cart, discarding in-memory state.
    ///
    /// Another process sharing the store may have written since this cart
    /// was loaded; the stored version wins.
    pub fn reload(&mut self) {
        self.items = hydrate(self.storage.as_ref());
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Line item for `product_id`.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    /// Number of distinct line items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of quantity times unit price, saturating at `Decimal::MAX`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items
            .iter()
            .map(CartLineItem::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Add `quantity` of `product`.
    ///
    /// A quantity below one is treated as one. If the product is already in
    /// the cart its quantity grows; otherwise a line is appended. Products
    /// without an id are ignored.
    pub fn add_item(&mut self, product: ProductSnapshot, quantity: i64) {
        if product.id.is_blank() {
            tracing::warn!("Ignoring cart addition for a product without an id");
            return;
        }
        let quantity = clamp_quantity(quantity);
        tracing::debug!(product_id = %product.id, quantity, "Adding to cart");

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product.id)
        {
            existing.quantity = existing.quantity.saturating_add(quantity);
        } else {
            self.items.push(CartLineItem::from_product(product, quantity));
        }
        self.persist("add_item");
    }

    /// Set the quantity of an existing line, clamped to at least one.
    ///
    /// Does nothing when the product is not in the cart.
    pub fn update_quantity(&mut self, product_id: &ProductId, quantity: i64) {
        let Some(item) = self
            .items
            .iter_mut()
            .find(|item| &item.product_id == product_id)
        else {
            return;
        };
        item.quantity = clamp_quantity(quantity);
        self.persist("update_quantity");
    }

    /// Drop the line for `product_id`, if present.
    pub fn remove_item(&mut self, product_id: &ProductId) {
        self.items.retain(|item| &item.product_id != product_id);
        self.persist("remove_item");
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.items.clear();
        self.persist("clear");
    }

    fn persist(&self, action: &str) {
        add_breadcrumb(
            "cart",
            action,
            &[
                ("lines", self.items.len().to_string()),
                ("item_count", self.item_count().to_string()),
            ],
        );

        let blob = match serde_json::to_string(&self.items) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize cart");
                return;
            }
        };
        if let Err(e) = self.storage.set(keys::CART, &blob) {
            tracing::error!(error = %e, "Failed to persist cart");
        }
    }
}

impl std::fmt::Debug for Cart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cart").field("items", &self.items).finish_non_exhaustive()
    }
}

fn clamp_quantity(quantity: i64) -> u32 {
    u32::try_from(quantity).ok().filter(|q| *q >= 1).unwrap_or(1)
}

/// Read the stored line items, tolerating anything older clients wrote.
fn hydrate(storage: &dyn KeyValueStore) -> Vec<CartLineItem> {
    let raw = match storage.get(keys::CART) {
        Ok(Some(raw)) if !raw.trim().is_empty() => raw,
        Ok(_) => return Vec::new(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read stored cart");
            return Vec::new();
        }
    };

    let entries = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(other) => {
            tracing::error!(kind = %json_kind(&other), "Stored cart is not a list, starting empty");
            return Vec::new();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse stored cart, starting empty");
            return Vec::new();
        }
    };

    let mut items: Vec<CartLineItem> = Vec::with_capacity(entries.len());
    for entry in &entries {
        let Some(item) = CartLineItem::from_stored(entry) else {
            tracing::warn!("Dropping stored cart entry without a product id");
            continue;
        };
        if let Some(existing) = items.iter_mut().find(|i| i.product_id == item.product_id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            items.push(item);
        }
    }
    items
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
