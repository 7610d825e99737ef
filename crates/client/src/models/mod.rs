//! Domain models exchanged with the backend.
//!
//! These are the typed payloads the dispatcher validates responses against.
//! Unknown fields are ignored; missing required fields fail decoding.

pub mod address;
pub mod identity;
pub mod order;

pub use address::Address;
pub use identity::{AdminRegistration, AdminUser, Customer, CustomerRegistration, LoginCredentials};
pub use order::{Order, OrderDetail, OrderItem, OrderPage, PageMeta};

use serde::{Deserialize, Deserializer};

/// Deserialize `null` as `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
