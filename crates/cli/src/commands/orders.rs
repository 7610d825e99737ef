//! Order history commands.

use shopdesk_client::ClientState;
use shopdesk_client::orders::PageRequest;
use shopdesk_core::OrderId;

use super::{CliError, parse_raw_id};

/// Print one page of orders.
///
/// # Errors
///
/// Returns the server error, or `ApiError::MissingCredential` without a
/// customer session.
#[allow(clippy::print_stdout)]
pub async fn list(
    state: &ClientState,
    page: Option<u32>,
    per_page: Option<u32>,
) -> Result<(), CliError> {
    let orders = state.orders().list(PageRequest { page, per_page }).await?;
    for order in &orders.data {
        let placed = order
            .placed_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!(
            "{:<14} {:<10} {:<12} {} {}",
            order.display_reference(),
            placed,
            order.status,
            order.total,
            order.currency.as_deref().unwrap_or("")
        );
    }
    println!("{} of {} order(s)", orders.data.len(), orders.total());
    Ok(())
}

/// Print one order with its lines.
///
/// # Errors
///
/// As [`list`]; unknown ids are `ApiError::NotFound`.
#[allow(clippy::print_stdout)]
pub async fn show(state: &ClientState, id: &str) -> Result<(), CliError> {
    let detail = state.orders().get(&OrderId::from(parse_raw_id(id))).await?;
    let summary = &detail.summary;
    println!("Order {} ({})", summary.display_reference(), summary.status);
    for item in &detail.items {
        println!(
            "  {} x {} @ {} = {}",
            item.quantity, item.product_name, item.unit_price, item.total
        );
    }
    println!("Total: {} {}", summary.total, summary.currency.as_deref().unwrap_or(""));
    if let Some(notes) = detail.notes.as_deref().filter(|n| !n.is_empty()) {
        println!("Notes: {notes}");
    }
    Ok(())
}
