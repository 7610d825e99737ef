//! Cart commands.

use rust_decimal::Decimal;
use shopdesk_client::ClientState;
use shopdesk_client::cart::ProductSnapshot;
use shopdesk_core::ProductId;

use super::parse_raw_id;

/// Build the snapshot of a product described on the command line.
pub fn product(
    id: &str,
    name: String,
    price: Decimal,
    slug: Option<String>,
    variant: Option<String>,
) -> ProductSnapshot {
    ProductSnapshot {
        id: ProductId::from(parse_raw_id(id)),
        slug,
        name,
        price,
        image_url: None,
        variant,
    }
}

pub async fn add(state: &ClientState, product: ProductSnapshot, quantity: i64) {
    let mut cart = state.cart().await;
    cart.add_item(product, quantity);
    print_summary(cart.item_count(), cart.subtotal());
}

pub async fn update(state: &ClientState, product_id: &str, quantity: i64) {
    let mut cart = state.cart().await;
    cart.update_quantity(&ProductId::from(parse_raw_id(product_id)), quantity);
    print_summary(cart.item_count(), cart.subtotal());
}

pub async fn remove(state: &ClientState, product_id: &str) {
    let mut cart = state.cart().await;
    cart.remove_item(&ProductId::from(parse_raw_id(product_id)));
    print_summary(cart.item_count(), cart.subtotal());
}

pub async fn clear(state: &ClientState) {
    let mut cart = state.cart().await;
    cart.clear();
    print_summary(cart.item_count(), cart.subtotal());
}

#[allow(clippy::print_stdout)]
pub async fn list(state: &ClientState) {
    let cart = state.cart().await;
    if cart.is_empty() {
        println!("Cart is empty");
        return;
    }
    for item in cart.items() {
        let variant = item
            .variant
            .as_deref()
            .map(|v| format!(" [{v}]"))
            .unwrap_or_default();
        println!(
            "{:>8}  {:<32}{variant}  {} x {} = {}",
            item.product_id,
            item.name,
            item.quantity,
            item.unit_price,
            item.line_total()
        );
    }
    print_summary(cart.item_count(), cart.subtotal());
}

#[allow(clippy::print_stdout)]
fn print_summary(item_count: u64, subtotal: Decimal) {
    println!("{item_count} item(s), subtotal {subtotal}");
}
