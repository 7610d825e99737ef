use serde::{Deserialize, Serialize};
use shopdesk_core::ProductId;
use uuid::Uuid;

use super::form::{CheckoutForm, CustomerDetails, PaymentMethod};
use crate::cart::Cart;
use crate::models::Order;

/// One `(product, quantity, variant)` entry of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionLine {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Immutable snapshot of the form and cart at submit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSubmission {
    pub customer: CustomerDetails,
    pub items: Vec<SubmissionLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
}

impl CheckoutSubmission {
    /// Snapshot `form` and the lines of `cart`.
    #[must_use]
    pub fn snapshot(form: &CheckoutForm, cart: &Cart) -> Self {
        let notes = form.notes.trim();
        Self {
            customer: form.customer.clone(),
            items: cart
                .items()
                .iter()
                .map(|item| SubmissionLine {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                    variant: item.variant.clone(),
                })
                .collect(),
            notes: (!notes.is_empty()).then(|| notes.to_string()),
            payment_method: form.payment_method.clone(),
        }
    }
}

/// Request body: the snapshot plus its submission id.
#[derive(Serialize)]
pub(super) struct SubmissionBody<'a> {
    #[serde(flatten)]
    pub submission: &'a CheckoutSubmission,
    pub submission_id: Uuid,
}

/// The checkout endpoint answers with the order itself or with it wrapped
/// in `data`.
#[derive(Deserialize)]
#[serde(untagged)]
pub(super) enum OrderResponse {
    Wrapped { data: Order },
    Bare(Order),
}

impl From<OrderResponse> for Order {
    fn from(response: OrderResponse) -> Self {
        match response {
            OrderResponse::Wrapped { data } | OrderResponse::Bare(data) => data,
        }
    }
}
