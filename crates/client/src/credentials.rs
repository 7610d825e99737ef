//! Per-audience bearer token storage.
//!
//! The admin and customer tokens live side by side but are never read or
//! written together: every operation names exactly one [`Audience`].

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use shopdesk_core::Audience;

use crate::storage::{KeyValueStore, keys};

/// Storage key holding the token for `audience`.
#[must_use]
pub const fn token_key(audience: Audience) -> &'static str {
    match audience {
        Audience::Admin => keys::ADMIN_TOKEN,
        Audience::Customer => keys::CUSTOMER_TOKEN,
    }
}

#[derive(Default)]
struct Slot {
    token: Option<SecretString>,
    initialized: bool,
}

/// Shared handle to both audiences' credentials.
///
/// Cheap to clone; every clone sees the same tokens, so a token stored by a
/// session manager is visible to the dispatcher on its very next request.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<CredentialStoreInner>,
}

struct CredentialStoreInner {
    storage: Arc<dyn KeyValueStore>,
    admin: RwLock<Slot>,
    customer: RwLock<Slot>,
}

impl CredentialStore {
    /// Create a credential store, hydrating both tokens from `storage`.
    ///
    /// Read failures are logged and treated as "no token".
    #[must_use]
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let read = |audience: Audience| {
            let token = match storage.get(token_key(audience)) {
                Ok(token) => token.filter(|t| !t.is_empty()).map(SecretString::from),
                Err(e) => {
                    tracing::error!(%audience, error = %e, "Failed to read persisted token");
                    None
                }
            };
            RwLock::new(Slot {
                token,
                initialized: false,
            })
        };

        let admin = read(Audience::Admin);
        let customer = read(Audience::Customer);

        Self {
            inner: Arc::new(CredentialStoreInner {
                storage,
                admin,
                customer,
            }),
        }
    }

    fn slot(&self, audience: Audience) -> &RwLock<Slot> {
        match audience {
            Audience::Admin => &self.inner.admin,
            Audience::Customer => &self.inner.customer,
        }
    }

    /// Current token for `audience`, if any.
    #[must_use]
    pub fn token(&self, audience: Audience) -> Option<SecretString> {
        self.slot(audience)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    /// Whether a token is held for `audience`.
    #[must_use]
    pub fn has_token(&self, audience: Audience) -> bool {
        self.slot(audience)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .is_some()
    }

    /// Store a new token for `audience` and persist it.
    ///
    /// The in-memory value is authoritative even if persisting fails.
    pub fn set_token(&self, audience: Audience, token: SecretString) {
        let persisted = self
            .inner
            .storage
            .set(token_key(audience), token.expose_secret());
        if let Err(e) = persisted {
            tracing::error!(%audience, error = %e, "Failed to persist token");
        }

        self.slot(audience)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .token = Some(token);
    }

    /// Drop the token for `audience` only.
    pub fn clear(&self, audience: Audience) {
        self.slot(audience)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .token = None;

        if let Err(e) = self.inner.storage.remove(token_key(audience)) {
            tracing::error!(%audience, error = %e, "Failed to remove persisted token");
        }
    }

    /// Drop the token for `audience` only if it is still `expected`.
    ///
    /// Returns `false` when the token was replaced or cleared in the
    /// meantime, leaving the current one untouched.
    pub fn clear_if_current(&self, audience: Audience, expected: &SecretString) -> bool {
        {
            let mut slot = self
                .slot(audience)
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let current = slot
                .token
                .as_ref()
                .is_some_and(|held| held.expose_secret() == expected.expose_secret());
            if !current {
                return false;
            }
            slot.token = None;
        }

        if let Err(e) = self.inner.storage.remove(token_key(audience)) {
            tracing::error!(%audience, error = %e, "Failed to remove persisted token");
        }
        true
    }

    /// Whether an identity-fetch attempt has completed for `audience`.
    #[must_use]
    pub fn is_initialized(&self, audience: Audience) -> bool {
        self.slot(audience)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .initialized
    }

    /// Record whether an identity-fetch attempt has completed for `audience`.
    pub fn set_initialized(&self, audience: Audience, initialized: bool) {
        self.slot(audience)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .initialized = initialized;
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("admin", &self.has_token(Audience::Admin))
            .field("customer", &self.has_token(Audience::Customer))
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn exposed(store: &CredentialStore, audience: Audience) -> Option<String> {
        store
            .token(audience)
            .map(|t| t.expose_secret().to_string())
    }

    #[test]
    fn test_hydrates_both_tokens() {
        let storage = Arc::new(MemoryStore::with_entries([
            (keys::ADMIN_TOKEN, "adm"),
            (keys::CUSTOMER_TOKEN, "cus"),
        ]));
        let store = CredentialStore::load(storage);

        assert_eq!(exposed(&store, Audience::Admin).as_deref(), Some("adm"));
        assert_eq!(exposed(&store, Audience::Customer).as_deref(), Some("cus"));
        assert!(!store.is_initialized(Audience::Admin));
    }

    #[test]
    fn test_clearing_one_audience_keeps_the_other() {
        let storage = Arc::new(MemoryStore::new());
        let store = CredentialStore::load(storage.clone());
        store.set_token(Audience::Admin, SecretString::from("adm"));
        store.set_token(Audience::Customer, SecretString::from("cus"));

        store.clear(Audience::Customer);

        assert_eq!(exposed(&store, Audience::Admin).as_deref(), Some("adm"));
        assert!(!store.has_token(Audience::Customer));
        assert_eq!(storage.get(keys::ADMIN_TOKEN).unwrap().as_deref(), Some("adm"));
        assert_eq!(storage.get(keys::CUSTOMER_TOKEN).unwrap(), None);
    }

    #[test]
    fn test_clear_if_current_spares_a_replaced_token() {
        let storage = Arc::new(MemoryStore::new());
        let store = CredentialStore::load(storage.clone());
        let stale = SecretString::from("cus-1");
        store.set_token(Audience::Customer, stale.clone());
        store.set_token(Audience::Customer, SecretString::from("cus-2"));

        assert!(!store.clear_if_current(Audience::Customer, &stale));
        assert_eq!(exposed(&store, Audience::Customer).as_deref(), Some("cus-2"));
        assert_eq!(storage.get(keys::CUSTOMER_TOKEN).unwrap().as_deref(), Some("cus-2"));

        assert!(store.clear_if_current(Audience::Customer, &SecretString::from("cus-2")));
        assert!(!store.has_token(Audience::Customer));
        assert_eq!(storage.get(keys::CUSTOMER_TOKEN).unwrap(), None);
    }

    #[test]
    fn test_clones_share_state() {
        let store = CredentialStore::load(Arc::new(MemoryStore::new()));
        let clone = store.clone();
        store.set_token(Audience::Customer, SecretString::from("rotated"));
        assert_eq!(exposed(&clone, Audience::Customer).as_deref(), Some("rotated"));
    }

    #[test]
    fn test_empty_persisted_token_is_ignored() {
        let storage = Arc::new(MemoryStore::with_entries([(keys::ADMIN_TOKEN, "")]));
        let store = CredentialStore::load(storage);
        assert!(!store.has_token(Audience::Admin));
    }

    #[test]
    fn test_debug_does_not_leak_tokens() {
        let store = CredentialStore::load(Arc::new(MemoryStore::new()));
        store.set_token(Audience::Admin, SecretString::from("super-secret-token"));
        let debug = format!("{store:?}");
        assert!(!debug.contains("super-secret-token"));
    }
}
