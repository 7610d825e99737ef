//! shopdesk Core - Shared domain types.
//!
//! This crate provides the types shared by every shopdesk component:
//! - `client` - Commerce session layer (cart, sessions, checkout)
//! - `cli` - Command-line front end over the client layer
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no storage,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Opaque ids, audiences, emails, money helpers, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
