//! Newtype IDs for type-safe entity references.
//!
//! The backend hands out identifiers as either JSON numbers or strings, and
//! the client never does arithmetic on them. Every ID therefore wraps a
//! [`RawId`] that keeps whichever representation the server used, so a value
//! written back to the server (or to durable storage) is byte-for-byte what
//! was received.

use core::fmt;

use serde::{Deserialize, Serialize};

/// The wire representation of an opaque identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    /// Numeric identifier (`42`).
    Int(i64),
    /// String identifier (`"sku-42"`).
    Text(String),
}

impl RawId {
    /// Returns `true` for an empty string id, which the backend never issues.
    #[must_use]
    pub const fn is_blank(&self) -> bool {
        match self {
            Self::Int(_) => false,
            Self::Text(s) => s.is_empty(),
        }
    }
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// Macro to define a type-safe opaque ID wrapper.
///
/// Creates a newtype wrapper around [`RawId`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `Display`
/// - `From<i64>`, `From<&str>` and `From<String>` implementations
///
/// # Example
///
/// ```rust
/// # use shopdesk_core::define_id;
/// define_id!(WidgetId);
/// define_id!(GadgetId);
///
/// let widget = WidgetId::from(1);
/// let gadget = GadgetId::from("g-1");
///
/// assert_eq!(widget.to_string(), "1");
/// assert_eq!(gadget.to_string(), "g-1");
/// // These are different types, so this won't compile:
/// // let _: WidgetId = gadget;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name($crate::RawId);

        impl $name {
            /// Borrow the underlying wire representation.
            #[must_use]
            pub const fn raw(&self) -> &$crate::RawId {
                &self.0
            }

            /// Returns `true` if the id is an empty string.
            #[must_use]
            pub const fn is_blank(&self) -> bool {
                self.0.is_blank()
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self($crate::RawId::Int(id))
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self($crate::RawId::Text(id.to_owned()))
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self($crate::RawId::Text(id))
            }
        }

        impl From<$crate::RawId> for $name {
            fn from(id: $crate::RawId) -> Self {
                Self(id)
            }
        }
    };
}

// Define standard entity IDs
define_id!(ProductId);
define_id!(OrderId);
define_id!(CustomerId);
define_id!(AdminUserId);
define_id!(CategoryId);
