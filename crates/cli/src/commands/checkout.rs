//! Order submission from the command line.

use std::sync::Arc;

use shopdesk_client::ClientState;
use shopdesk_client::checkout::{PaymentMethod, TracingNotifier};
use shopdesk_client::models::Address;

use super::CliError;

/// Checkout details collected from flags.
pub struct CheckoutInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub notes: Option<String>,
    pub payment: PaymentMethod,
}

/// Submit the cart. Flags override whatever the customer profile pre-filled.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart` without contacting the server, or the
/// submission failure. The cart is left as it was on error.
#[allow(clippy::print_stdout)]
pub async fn submit(state: &ClientState, input: CheckoutInput) -> Result<(), CliError> {
    let mut orchestrator = state.checkout(Arc::new(TracingNotifier)).await;

    let form = orchestrator.form_mut();
    form.customer.email = input.email;
    form.customer.first_name = input.first_name;
    form.customer.last_name = input.last_name;
    if let Some(phone) = input.phone {
        form.customer.phone = phone;
    }
    form.customer.billing_address = Address {
        line1: input.line1,
        line2: input.line2,
        postal_code: input.postal_code,
        city: input.city,
        country: input.country,
    };
    form.customer.shipping_address = form.customer.billing_address.clone();
    form.notes = input.notes.unwrap_or_default();
    form.payment_method = input.payment;

    let order = orchestrator.submit(&mut *state.cart().await).await?;
    println!(
        "Order {} placed, total {} {}",
        order.display_reference(),
        order.total,
        order.currency.as_deref().unwrap_or("")
    );
    Ok(())
}
