//! Postal addresses.

use serde::{Deserialize, Deserializer, Serialize};

use super::null_as_default;

/// Default country code for new checkout forms.
pub const DEFAULT_COUNTRY: &str = "FR";

/// A billing or shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, deserialize_with = "null_as_default")]
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub postal_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default = "default_country", deserialize_with = "null_as_default_country")]
    pub country: String,
}

fn default_country() -> String {
    DEFAULT_COUNTRY.to_string()
}

fn null_as_default_country<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(default_country))
}

impl Default for Address {
    fn default() -> Self {
        Self {
            line1: String::new(),
            line2: None,
            postal_code: String::new(),
            city: String::new(),
            country: default_country(),
        }
    }
}

impl Address {
    /// Whether no street, postal code, or city has been entered.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.line1.trim().is_empty()
            && self.postal_code.trim().is_empty()
            && self.city.trim().is_empty()
    }
}
