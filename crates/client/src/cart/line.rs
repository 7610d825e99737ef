use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use shopdesk_core::{ProductId, lenient_decimal, lenient_quantity};

/// One product row in the cart.
///
/// Persisted with the field names storefront clients have always used, so a
/// cart written by an older client hydrates unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "price")]
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl CartLineItem {
    pub(super) fn from_product(product: ProductSnapshot, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            slug: product.slug,
            name: product.name,
            unit_price: product.price,
            image_url: product.image_url,
            quantity,
            variant: product.variant,
        }
    }

    /// Rebuild a line from whatever JSON a client stored.
    ///
    /// Returns `None` when the entry has no usable product id.
    pub(super) fn from_stored(entry: &Value) -> Option<Self> {
        let product_id = entry
            .get("product_id")
            .and_then(|id| ProductId::deserialize(id).ok())
            .filter(|id| !id.is_blank())?;
        let text = |key: &str| {
            entry
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .filter(|s| !s.is_empty())
        };

        Some(Self {
            product_id,
            slug: text("slug"),
            name: text("name").unwrap_or_default(),
            unit_price: entry.get("price").map_or(Decimal::ZERO, lenient_decimal),
            image_url: text("image_url"),
            quantity: entry.get("quantity").and_then(lenient_quantity).unwrap_or(1),
            variant: text("variant"),
        })
    }

    /// Quantity times unit price, saturating at `Decimal::MAX`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// The product fields the cart copies when an item is added.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "price_or_zero")]
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
}

fn price_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    Value::deserialize(deserializer).map(|value| lenient_decimal(&value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_persisted_field_names() {
        let line = CartLineItem {
            product_id: ProductId::from(4),
            slug: Some("mug".to_string()),
            name: "Mug".to_string(),
            unit_price: Decimal::new(1290, 2),
            image_url: None,
            quantity: 2,
            variant: None,
        };

        let json = serde_json::to_value(&line).unwrap();

        assert_eq!(
            json,
            json!({"product_id": 4, "slug": "mug", "name": "Mug", "price": "12.90", "quantity": 2})
        );
        assert_eq!(line.line_total(), Decimal::new(2580, 2));
    }

    #[test]
    fn test_product_snapshot_tolerates_string_prices() {
        let product: ProductSnapshot =
            serde_json::from_value(json!({"id": "sku-1", "name": "Tee", "price": "19.90"})).unwrap();
        assert_eq!(product.price, Decimal::new(1990, 2));

        let product: ProductSnapshot =
            serde_json::from_value(json!({"id": 2, "name": "Tee", "price": null})).unwrap();
        assert_eq!(product.price, Decimal::ZERO);
    }
}
