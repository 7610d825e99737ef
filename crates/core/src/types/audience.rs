//! Identity domains.
//!
//! Back-office staff and storefront customers authenticate independently and
//! never share a credential.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Which identity domain a credential or endpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Back-office staff.
    Admin,
    /// Storefront customer.
    Customer,
}

impl Audience {
    /// Both audiences, admin first.
    pub const ALL: [Self; 2] = [Self::Admin, Self::Customer];

    /// Path segment the backend mounts this audience's endpoints under.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Customer => "client",
        }
    }

    /// The other audience.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Admin => Self::Customer,
            Self::Customer => Self::Admin,
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::Customer => f.write_str("customer"),
        }
    }
}

/// Error returned when parsing an unknown audience name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown audience: {0} (expected admin or customer)")]
pub struct ParseAudienceError(pub String);

impl std::str::FromStr for Audience {
    type Err = ParseAudienceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "customer" | "client" => Ok(Self::Customer),
            other => Err(ParseAudienceError(other.to_owned())),
        }
    }
}
