//! Server-confirmed orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopdesk_core::{OrderId, OrderStatus, PaymentStatus, ProductId};

use super::{Address, null_as_default};

/// An order as summarized by the backend.
///
/// Returned by checkout and by the order-history list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub placed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items_count: Option<u32>,
}

impl Order {
    /// Customer-facing reference: the reference, else the number, else the id.
    #[must_use]
    pub fn display_reference(&self) -> String {
        self.reference
            .clone()
            .or_else(|| self.number.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// A line of an order detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: shopdesk_core::RawId,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

/// Full order with addresses and lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub summary: Order,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// Pagination metadata of a list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub current_page: Option<u32>,
}

/// One page of the customer's order history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPage {
    pub data: Vec<Order>,
    #[serde(default)]
    pub meta: PageMeta,
}

impl OrderPage {
    /// Total number of orders; the page length when the server omits it.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.meta.total.unwrap_or(self.data.len() as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_reference_fallbacks() {
        let order: Order = serde_json::from_str(r#"{"id":12,"reference":"CMD-0012"}"#).unwrap();
        assert_eq!(order.display_reference(), "CMD-0012");
        assert_eq!(order.status, OrderStatus::Pending);

        let order: Order = serde_json::from_str(r#"{"id":12,"number":"N12"}"#).unwrap();
        assert_eq!(order.display_reference(), "N12");

        let order: Order = serde_json::from_str(r#"{"id":"ord_12"}"#).unwrap();
        assert_eq!(order.display_reference(), "ord_12");
    }

    #[test]
    fn test_totals_accept_numbers_and_strings() {
        let order: Order = serde_json::from_str(r#"{"id":1,"total":"25.00"}"#).unwrap();
        assert_eq!(order.total, Decimal::new(25, 0));
        let order: Order = serde_json::from_str(r#"{"id":1,"total":25}"#).unwrap();
        assert_eq!(order.total, Decimal::new(25, 0));
    }

    #[test]
    fn test_order_detail_flattens_summary() {
        let detail: OrderDetail = serde_json::from_str(
            r#"{
                "id": 5,
                "reference": "CMD-5",
                "status": "shipped",
                "placed_at": "2026-03-01T10:00:00Z",
                "items": [
                    {"id": 1, "product_id": 9, "product_name": "Tee", "quantity": 2, "unit_price": "10.00", "total": "20.00"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(detail.summary.status, OrderStatus::Shipped);
        assert_eq!(detail.items.len(), 1);
        assert!(detail.summary.placed_at.is_some());
    }

    #[test]
    fn test_page_total_defaults_to_page_length() {
        let page: OrderPage = serde_json::from_str(r#"{"data":[{"id":1},{"id":2}]}"#).unwrap();
        assert_eq!(page.total(), 2);

        let page: OrderPage =
            serde_json::from_str(r#"{"data":[{"id":1}],"meta":{"total":40}}"#).unwrap();
        assert_eq!(page.total(), 40);
    }
}
