//! Shopdesk commerce session layer.
//!
//! Client-side state shared by the storefront and the back office:
//!
//! - [`cart`] - persistent, product-unique shopping cart
//! - [`dispatcher`] - single outbound gateway that attaches exactly one
//!   audience's bearer token per request
//! - [`session`] - login, identity, and logout for each audience
//! - [`checkout`] - turns the cart and the checkout form into an order
//!
//! [`state::ClientState`] wires these together over a durable
//! [`storage::KeyValueStore`] and an HTTP [`transport::Transport`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod locale;
pub mod models;
pub mod orders;
pub mod profile;
pub mod session;
pub mod state;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use error::{ApiError, ErrorKind, Result};
pub use state::ClientState;
