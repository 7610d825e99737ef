//! Checkout form state and step sequencing.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::models::{Address, Customer};

/// UI collection steps, in order.
///
/// Steps only sequence data entry; they never gate submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutStep {
    #[default]
    Info,
    Shipping,
    Payment,
}

impl CheckoutStep {
    /// The following step, or `self` at the end.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Info => Self::Shipping,
            Self::Shipping | Self::Payment => Self::Payment,
        }
    }

    /// The preceding step, or `self` at the start.
    #[must_use]
    pub const fn prev(self) -> Self {
        match self {
            Self::Info | Self::Shipping => Self::Info,
            Self::Payment => Self::Shipping,
        }
    }
}

/// Payment method tag forwarded to the server. No payment is processed
/// client-side.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[default]
    CashOnDelivery,
    Card,
    BankTransfer,
    Other(String),
}

impl PaymentMethod {
    /// Wire tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CashOnDelivery => "cod",
            Self::Card => "card",
            Self::BankTransfer => "bank_transfer",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "" | "cod" => Self::CashOnDelivery,
            "card" => Self::Card,
            "bank_transfer" => Self::BankTransfer,
            other => Self::Other(other.to_string()),
        })
    }
}

impl Serialize for PaymentMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Contact details and addresses as entered.
///
/// Fields are raw form input; the server validates them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CustomerDetails {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub billing_address: Address,
    pub shipping_address: Address,
}

/// Everything the checkout screens collect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckoutForm {
    pub customer: CustomerDetails,
    pub notes: String,
    pub payment_method: PaymentMethod,
}

impl CheckoutForm {
    /// Copy saved contact details and addresses from `customer` into empty
    /// fields.
    pub fn prefill_from(&mut self, customer: &Customer) {
        let details = &mut self.customer;
        fill(&mut details.email, Some(customer.email.as_str()));
        fill(&mut details.first_name, customer.first_name.as_deref());
        fill(&mut details.last_name, customer.last_name.as_deref());
        fill(&mut details.phone, customer.phone.as_deref());

        if details.billing_address.is_blank()
            && let Some(address) = &customer.billing_address
        {
            details.billing_address = address.clone();
        }
        if details.shipping_address.is_blank()
            && let Some(address) = customer
                .shipping_address
                .as_ref()
                .or(customer.billing_address.as_ref())
        {
            details.shipping_address = address.clone();
        }
    }
}

fn fill(field: &mut String, value: Option<&str>) {
    if field.trim().is_empty()
        && let Some(value) = value.filter(|v| !v.trim().is_empty())
    {
        *field = value.to_string();
    }
}
