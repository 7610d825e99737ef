//! Subcommand implementations.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod locale;
pub mod orders;

use shopdesk_client::ApiError;
use shopdesk_client::checkout::CheckoutError;
use shopdesk_client::transport::TransportError;
use shopdesk_core::{EmailError, RawId};
use thiserror::Error;

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// The HTTP client could not be built.
    #[error("Could not start HTTP client: {0}")]
    Startup(#[from] TransportError),

    /// The server call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The order was not placed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Invalid email address.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
}

/// Interpret a command-line id the way the backend issues them: digits are
/// numeric ids, anything else is a string id.
pub fn parse_raw_id(input: &str) -> RawId {
    let input = input.trim();
    input
        .parse::<i64>()
        .map_or_else(|_| RawId::Text(input.to_owned()), RawId::Int)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_id() {
        assert_eq!(parse_raw_id("42"), RawId::Int(42));
        assert_eq!(parse_raw_id(" sku-42 "), RawId::Text("sku-42".to_string()));
    }
}
