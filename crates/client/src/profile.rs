//! Customer profile read and update.
//!
//! Every successful call refreshes the customer session's identity, so the
//! session never shows a name or email older than the last profile response.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopdesk_core::{Audience, Email};
use tracing::instrument;

use crate::dispatcher::{Dispatcher, Request};
use crate::error::Result;
use crate::models::Customer;
use crate::session::CustomerSession;

const PROFILE_PATH: &str = "/client/profile";

/// Lifetime figures shown next to the profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    #[serde(default)]
    pub orders_count: u64,
    #[serde(default)]
    pub total_spent: Decimal,
}

/// `GET`/`PUT /client/profile` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    pub profile: Customer,
    #[serde(default)]
    pub stats: Option<ProfileStats>,
}

/// Fields to change; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

/// Profile endpoints of the signed-in customer.
#[derive(Clone)]
pub struct ProfileService {
    dispatcher: Dispatcher,
    session: CustomerSession,
}

impl ProfileService {
    #[must_use]
    pub const fn new(dispatcher: Dispatcher, session: CustomerSession) -> Self {
        Self {
            dispatcher,
            session,
        }
    }

    /// Load the profile.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingCredential` without a customer session, or
    /// the dispatcher error.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Profile> {
        let request = Request::get(PROFILE_PATH)
            .for_audience(Audience::Customer)
            .require_credential();
        let profile: Profile = self.dispatcher.send_json(request).await?;
        self.refresh_identity(&profile.profile);
        Ok(profile)
    }

    /// Apply `update` and return the stored profile.
    ///
    /// # Errors
    ///
    /// As [`ProfileService::fetch`]; rejected fields arrive as
    /// `ApiError::Validation`.
    #[instrument(skip(self, update))]
    pub async fn update(&self, update: &ProfileUpdate) -> Result<Profile> {
        let request = Request::put(PROFILE_PATH)
            .for_audience(Audience::Customer)
            .require_credential()
            .json(update)?;
        let profile: Profile = self.dispatcher.send_json(request).await?;
        self.refresh_identity(&profile.profile);
        tracing::info!(customer_id = %profile.profile.id, "Profile updated");
        Ok(profile)
    }

    fn refresh_identity(&self, fresh: &Customer) {
        let merged = match self.session.identity() {
            Some(current) => merge(current, fresh),
            None => fresh.clone(),
        };
        self.session.set_identity(merged);
    }
}

/// Overlay the profile's fields on the session identity, keeping saved
/// addresses the profile endpoint does not return.
fn merge(current: Customer, fresh: &Customer) -> Customer {
    Customer {
        billing_address: fresh.billing_address.clone().or(current.billing_address),
        shipping_address: fresh.shipping_address.clone().or(current.shipping_address),
        ..fresh.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::credentials::CredentialStore;
    use crate::dispatcher::UnclassifiedPolicy;
    use crate::error::ApiError;
    use crate::locale::LocalePreference;
    use crate::models::LoginCredentials;
    use crate::storage::MemoryStore;
    use crate::testing::ScriptedTransport;

    fn setup() -> (ProfileService, CustomerSession, Arc<ScriptedTransport>) {
        let storage = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new());
        let dispatcher = Dispatcher::new(
            transport.clone(),
            CredentialStore::load(storage.clone()),
            LocalePreference::new(storage),
            "https://shop.example.fr/api",
            "/api",
            UnclassifiedPolicy::AdminFallback,
        );
        let session = CustomerSession::new(dispatcher.clone());
        (
            ProfileService::new(dispatcher, session.clone()),
            session,
            transport,
        )
    }

    async fn sign_in(session: &CustomerSession, transport: &ScriptedTransport) {
        transport.push_json(
            200,
            r#"{"token":"cus-1","customer":{"id":7,"name":"Jane Doe","email":"jane@example.fr",
                "billing_address":{"line1":"1 rue de la Paix","postal_code":"75002","city":"Paris"}}}"#,
        );
        session
            .login(&LoginCredentials::new(
                Email::parse("jane@example.fr").unwrap(),
                "hunter22",
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fetch_requires_session() {
        let (profiles, _session, transport) = setup();

        let err = profiles.fetch().await.unwrap_err();

        assert!(matches!(err, ApiError::MissingCredential(Audience::Customer)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_update_refreshes_identity_and_keeps_addresses() {
        let (profiles, session, transport) = setup();
        sign_in(&session, &transport).await;
        transport.push_json(
            200,
            r#"{"profile":{"id":7,"name":"Jane Martin","email":"jane.martin@example.fr","last_name":"Martin"},
                "stats":{"orders_count":3,"total_spent":"149.70"}}"#,
        );

        let update = ProfileUpdate {
            last_name: Some("Martin".to_string()),
            ..ProfileUpdate::default()
        };
        let profile = profiles.update(&update).await.unwrap();

        assert_eq!(profile.stats.unwrap().orders_count, 3);
        let identity = session.identity().unwrap();
        assert_eq!(identity.email.as_str(), "jane.martin@example.fr");
        assert_eq!(identity.billing_address.unwrap().city, "Paris");

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.method, reqwest::Method::PUT);
        assert_eq!(sent.body, Some(serde_json::json!({"last_name": "Martin"})));
        assert_eq!(sent.header("Authorization"), Some("Bearer cus-1"));
    }
}
