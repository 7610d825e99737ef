//! Core types for shopdesk.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod audience;
pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use audience::{Audience, ParseAudienceError};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{lenient_decimal, lenient_quantity};
pub use status::*;
