//! Storefront locale preference.
//!
//! The preference is persisted under `client_locale`; a value written by older
//! clients under `locale` is still honored when the new key is absent. The
//! dispatcher forwards it on every request as `X-Client-Locale`.

use std::sync::Arc;

use serde::Serialize;
use shopdesk_core::Audience;
use tracing::instrument;

use crate::dispatcher::{Dispatcher, Request};
use crate::error::{ApiError, Result};
use crate::storage::{KeyValueStore, keys};

/// Maximum accepted length of a locale tag.
const MAX_LOCALE_LENGTH: usize = 35;

/// Handle to the persisted locale preference.
#[derive(Clone)]
pub struct LocalePreference {
    storage: Arc<dyn KeyValueStore>,
}

#[derive(Serialize)]
struct UpdateLocalePayload<'a> {
    locale: &'a str,
}

impl LocalePreference {
    /// Create a handle over `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Current preference, if one is stored.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        [keys::LOCALE, keys::LEGACY_LOCALE]
            .into_iter()
            .find_map(|key| match self.storage.get(key) {
                Ok(value) => value.filter(|v| !v.trim().is_empty()),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Failed to read locale preference");
                    None
                }
            })
    }

    /// Persist `locale` locally.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidTarget` if `locale` is not a plausible tag.
    pub fn set(&self, locale: &str) -> Result<()> {
        let locale = validate_locale(locale)?;
        if let Err(e) = self.storage.set(keys::LOCALE, locale) {
            tracing::error!(error = %e, "Failed to persist locale preference");
        }
        Ok(())
    }

    /// Forget the stored preference.
    pub fn clear(&self) {
        for key in [keys::LOCALE, keys::LEGACY_LOCALE] {
            if let Err(e) = self.storage.remove(key) {
                tracing::error!(key, error = %e, "Failed to remove locale preference");
            }
        }
    }

    /// Persist `locale` and record it on the customer's account.
    ///
    /// The local preference is kept even if the server call fails.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher error if the server rejects the update.
    #[instrument(skip(self, dispatcher))]
    pub async fn update_remote(&self, dispatcher: &Dispatcher, locale: &str) -> Result<()> {
        self.set(locale)?;
        let request = Request::post("/client/locale");
        let request = if dispatcher.credentials().has_token(Audience::Customer) {
            request.for_audience(Audience::Customer)
        } else {
            request.anonymous()
        };
        let request = request.json(&UpdateLocalePayload {
            locale: locale.trim(),
        })?;
        dispatcher.send_empty(request).await
    }
}

fn validate_locale(locale: &str) -> Result<&str> {
    let locale = locale.trim();
    let valid = !locale.is_empty()
        && locale.len() <= MAX_LOCALE_LENGTH
        && locale
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(locale)
    } else {
        Err(ApiError::InvalidTarget(format!("invalid locale: {locale:?}")))
    }
}
