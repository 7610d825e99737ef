//! Per-audience identity bindings.
//!
//! A [`Principal`] ties an identity record to its audience's endpoints and
//! response envelopes. The admin API wraps identities under `user`, the
//! storefront API under `customer`.

use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shopdesk_core::{Audience, Email};

use crate::models::{AdminRegistration, AdminUser, Customer, CustomerRegistration};

/// An identity that a [`super::SessionManager`] can own.
pub trait Principal: Clone + Send + Sync + 'static {
    /// Audience the identity belongs to.
    const AUDIENCE: Audience;

    /// Body of the registration request.
    type Registration: Serialize + Send + Sync;

    /// Body returned by login and register.
    type AuthResponse: DeserializeOwned + Send;

    /// Body returned by the identity endpoint.
    type MeResponse: DeserializeOwned + Send;

    /// Split a login/register response into the token and identity.
    fn from_auth(response: Self::AuthResponse) -> (SecretString, Self);

    /// Extract the identity from an identity-endpoint response.
    fn from_me(response: Self::MeResponse) -> Self;

    /// Stable identifier for error-tracking context.
    fn subject_id(&self) -> String;

    /// Email address of the identity.
    fn email(&self) -> &Email;
}

/// Endpoint paths for `audience`.
#[must_use]
pub fn endpoint(audience: Audience, action: &str) -> String {
    format!("/{}/{action}", audience.path_segment())
}

#[derive(Debug, Deserialize)]
pub struct AdminAuthResponse {
    token: String,
    user: AdminUser,
}

#[derive(Debug, Deserialize)]
pub struct AdminMeResponse {
    user: AdminUser,
}

#[derive(Debug, Deserialize)]
pub struct CustomerAuthResponse {
    token: String,
    customer: Customer,
}

#[derive(Debug, Deserialize)]
pub struct CustomerMeResponse {
    customer: Customer,
}

impl Principal for AdminUser {
    const AUDIENCE: Audience = Audience::Admin;
    type Registration = AdminRegistration;
    type AuthResponse = AdminAuthResponse;
    type MeResponse = AdminMeResponse;

    fn from_auth(response: AdminAuthResponse) -> (SecretString, Self) {
        (SecretString::from(response.token), response.user)
    }

    fn from_me(response: AdminMeResponse) -> Self {
        response.user
    }

    fn subject_id(&self) -> String {
        self.id.to_string()
    }

    fn email(&self) -> &Email {
        &self.email
    }
}

impl Principal for Customer {
    const AUDIENCE: Audience = Audience::Customer;
    type Registration = CustomerRegistration;
    type AuthResponse = CustomerAuthResponse;
    type MeResponse = CustomerMeResponse;

    fn from_auth(response: CustomerAuthResponse) -> (SecretString, Self) {
        (SecretString::from(response.token), response.customer)
    }

    fn from_me(response: CustomerMeResponse) -> Self {
        response.customer
    }

    fn subject_id(&self) -> String {
        self.id.to_string()
    }

    fn email(&self) -> &Email {
        &self.email
    }
}
