//! Identity records and authentication payloads.

use secrecy::{ExposeSecret, SecretString};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use shopdesk_core::{AdminRole, AdminUserId, CustomerId, Email};

use super::{Address, null_as_default};

/// A back-office staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: AdminUserId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub role: Option<AdminRole>,
}

impl AdminUser {
    /// Whether this user may use the back-office screens.
    #[must_use]
    pub fn has_back_office_access(&self) -> bool {
        self.role.is_some_and(AdminRole::has_back_office_access)
    }
}

/// A storefront customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
}

impl Customer {
    /// Name to greet the customer with.
    #[must_use]
    pub fn display_name(&self) -> String {
        if !self.name.trim().is_empty() {
            return self.name.clone();
        }
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.trim().is_empty())
            .collect();
        if parts.is_empty() {
            self.email.to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Email and password for either audience's login endpoint.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub email: Email,
    pub password: SecretString,
}

impl LoginCredentials {
    /// Build credentials from raw form input.
    #[must_use]
    pub fn new(email: Email, password: impl Into<String>) -> Self {
        Self {
            email,
            password: SecretString::from(password.into()),
        }
    }
}

impl Serialize for LoginCredentials {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LoginCredentials", 2)?;
        state.serialize_field("email", &self.email)?;
        state.serialize_field("password", self.password.expose_secret())?;
        state.end()
    }
}

/// Storefront sign-up form.
#[derive(Debug, Clone)]
pub struct CustomerRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub password: SecretString,
    pub password_confirmation: SecretString,
}

impl Serialize for CustomerRegistration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CustomerRegistration", 7)?;
        state.serialize_field("first_name", &self.first_name)?;
        state.serialize_field("last_name", &self.last_name)?;
        state.serialize_field("email", &self.email)?;
        state.serialize_field("phone", &self.phone)?;
        state.serialize_field("company_name", &self.company_name)?;
        state.serialize_field("password", self.password.expose_secret())?;
        state.serialize_field(
            "password_confirmation",
            self.password_confirmation.expose_secret(),
        )?;
        state.end()
    }
}

/// Back-office account creation form.
#[derive(Debug, Clone)]
pub struct AdminRegistration {
    pub name: String,
    pub email: Email,
    pub password: SecretString,
    pub password_confirmation: SecretString,
}

impl Serialize for AdminRegistration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AdminRegistration", 4)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("email", &self.email)?;
        state.serialize_field("password", self.password.expose_secret())?;
        state.serialize_field(
            "password_confirmation",
            self.password_confirmation.expose_secret(),
        )?;
        state.end()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_display_name() {
        let mut customer: Customer = serde_json::from_str(
            r#"{"id":3,"name":null,"email":"jane@example.fr","first_name":"Jane","last_name":"Doe"}"#,
        )
        .unwrap();
        assert_eq!(customer.display_name(), "Jane Doe");

        customer.name = "J. Doe".to_string();
        assert_eq!(customer.display_name(), "J. Doe");
    }

    #[test]
    fn test_admin_access() {
        let admin: AdminUser =
            serde_json::from_str(r#"{"id":1,"name":"Ops","email":"ops@example.fr","role":"manager"}"#)
                .unwrap();
        assert!(admin.has_back_office_access());

        let admin: AdminUser =
            serde_json::from_str(r#"{"id":2,"name":"Ops","email":"ops@example.fr"}"#).unwrap();
        assert!(!admin.has_back_office_access());
    }

    #[test]
    fn test_login_credentials_serialize_password_but_debug_redacts_it() {
        let credentials =
            LoginCredentials::new(Email::parse("jane@example.fr").unwrap(), "hunter22");
        let json = serde_json::to_value(&credentials).unwrap();
        assert_eq!(json["password"], "hunter22");
        assert!(!format!("{credentials:?}").contains("hunter22"));
    }

    #[test]
    fn test_missing_email_fails_loudly() {
        let result: Result<Customer, _> = serde_json::from_str(r#"{"id":3,"name":"Jane"}"#);
        assert!(result.is_err());
    }
}
