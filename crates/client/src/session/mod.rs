//! Per-audience session managers.
//!
//! A [`SessionManager`] owns one audience's identity and drives its
//! credential through the [`CredentialStore`]. It never touches the other
//! audience's token: logging a customer out leaves the back-office session
//! intact and vice versa.
//!
//! The identity is bound to the token it was obtained with. Whenever that
//! token disappears or is replaced (logout, a 401 on any request, a login in
//! another handle) [`SessionManager::identity`] reports `None` without
//! waiting for the next identity fetch.

mod principal;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use shopdesk_core::Audience;
use tracing::instrument;

pub use principal::{
    AdminAuthResponse, AdminMeResponse, CustomerAuthResponse, CustomerMeResponse, Principal,
    endpoint,
};

use crate::credentials::CredentialStore;
use crate::dispatcher::{Dispatcher, Request};
use crate::error::{Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::models::{AdminUser, Customer, LoginCredentials};

/// Back-office session.
pub type AdminSession = SessionManager<AdminUser>;

/// Storefront customer session.
pub type CustomerSession = SessionManager<Customer>;

/// Observable authentication state of one audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No token is held.
    Anonymous,
    /// A login, registration, or identity fetch is in flight.
    Pending,
    /// A token is held but its identity has not been fetched yet.
    Unverified,
    /// A token is held and its identity is known.
    Authenticated,
}

/// Identity and credential lifecycle for audience `P::AUDIENCE`.
///
/// Cheap to clone; clones share the same identity.
pub struct SessionManager<P: Principal> {
    inner: Arc<SessionInner<P>>,
}

impl<P: Principal> Clone for SessionManager<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SessionInner<P> {
    dispatcher: Dispatcher,
    identity: RwLock<Option<Bound<P>>>,
    in_flight: AtomicUsize,
}

/// An identity together with the token it belongs to.
struct Bound<P> {
    token: SecretString,
    identity: P,
}

/// Marks an operation in flight until dropped, including on cancellation.
struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<P: Principal> SessionManager<P> {
    /// Create a manager with no identity loaded.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                dispatcher,
                identity: RwLock::new(None),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Audience this manager serves.
    #[must_use]
    pub const fn audience(&self) -> Audience {
        P::AUDIENCE
    }

    fn credentials(&self) -> &CredentialStore {
        self.inner.dispatcher.credentials()
    }

    /// The identity for the token currently held, if known.
    #[must_use]
    pub fn identity(&self) -> Option<P> {
        let token = self.credentials().token(P::AUDIENCE)?;
        self.inner
            .identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|bound| bound.token.expose_secret() == token.expose_secret())
            .map(|bound| bound.identity.clone())
    }

    /// Replace the identity after a profile read or update.
    ///
    /// Ignored when no token is held.
    pub fn set_identity(&self, identity: P) {
        let Some(token) = self.credentials().token(P::AUDIENCE) else {
            tracing::debug!(audience = %P::AUDIENCE, "Ignoring identity update without a session");
            return;
        };
        self.bind(token, identity);
    }

    fn bind(&self, token: SecretString, identity: P) {
        *self
            .inner
            .identity
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Bound { token, identity });
    }

    fn forget(&self) {
        *self
            .inner
            .identity
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Whether both a token and an identity are held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity().is_some()
    }

    /// Whether an identity fetch has completed since startup or the last
    /// logout.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.credentials().is_initialized(P::AUDIENCE)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.inner.in_flight.load(Ordering::SeqCst) > 0 {
            SessionState::Pending
        } else if !self.credentials().has_token(P::AUDIENCE) {
            SessionState::Anonymous
        } else if self.identity().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unverified
        }
    }

    /// Exchange email and password for a session.
    ///
    /// On failure the previously held credential, if any, is left in place.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher error; a rejected login is
    /// `ApiError::Unauthorized` or `ApiError::Validation`.
    #[instrument(skip(self, credentials), fields(audience = %P::AUDIENCE))]
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<P> {
        let _pending = PendingGuard::enter(&self.inner.in_flight);
        let request = Request::post(endpoint(P::AUDIENCE, "login"))
            .anonymous()
            .json(credentials)?;
        let response: P::AuthResponse = self.inner.dispatcher.send_json(request).await?;
        Ok(self.establish(response, "login"))
    }

    /// Create an account and start its session.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher error; field problems arrive as
    /// `ApiError::Validation`.
    #[instrument(skip(self, registration), fields(audience = %P::AUDIENCE))]
    pub async fn register(&self, registration: &P::Registration) -> Result<P> {
        let _pending = PendingGuard::enter(&self.inner.in_flight);
        let request = Request::post(endpoint(P::AUDIENCE, "register"))
            .anonymous()
            .json(registration)?;
        let response: P::AuthResponse = self.inner.dispatcher.send_json(request).await?;
        Ok(self.establish(response, "register"))
    }

    fn establish(&self, response: P::AuthResponse, action: &str) -> P {
        let (token, identity) = P::from_auth(response);
        self.credentials().set_token(P::AUDIENCE, token.clone());
        self.bind(token, identity.clone());
        self.credentials().set_initialized(P::AUDIENCE, true);

        set_sentry_user(P::AUDIENCE, &identity.subject_id(), Some(identity.email().as_str()));
        add_breadcrumb(
            "auth",
            action,
            &[("audience", P::AUDIENCE.to_string())],
        );
        tracing::info!(audience = %P::AUDIENCE, subject = %identity.subject_id(), "Session established");
        identity
    }

    /// Load the identity for the held token.
    ///
    /// Without a token this only marks the session initialized. If the fetch
    /// fails for any reason the token and identity are discarded.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher error after clearing the session.
    #[instrument(skip(self), fields(audience = %P::AUDIENCE))]
    pub async fn fetch_identity(&self) -> Result<Option<P>> {
        let Some(token) = self.credentials().token(P::AUDIENCE) else {
            self.forget();
            self.credentials().set_initialized(P::AUDIENCE, true);
            return Ok(None);
        };

        let _pending = PendingGuard::enter(&self.inner.in_flight);
        let request = Request::get(endpoint(P::AUDIENCE, "me"))
            .for_audience(P::AUDIENCE)
            .require_credential();
        let result = self
            .inner
            .dispatcher
            .send_json::<P::MeResponse>(request)
            .await;
        self.credentials().set_initialized(P::AUDIENCE, true);

        match result {
            Ok(response) => {
                let identity = P::from_me(response);
                self.bind(token, identity.clone());
                set_sentry_user(P::AUDIENCE, &identity.subject_id(), Some(identity.email().as_str()));
                Ok(Some(identity))
            }
            Err(e) => {
                let cleared = self.credentials().clear_if_current(P::AUDIENCE, &token);
                if cleared || !self.credentials().has_token(P::AUDIENCE) {
                    tracing::warn!(audience = %P::AUDIENCE, error = %e, "Identity fetch failed, discarding session");
                    self.forget();
                } else {
                    tracing::debug!(audience = %P::AUDIENCE, error = %e, "Identity fetch failed for a replaced token");
                }
                Err(e)
            }
        }
    }

    /// End the session.
    ///
    /// The server is told on a best-effort basis; local state is cleared
    /// regardless of the outcome.
    #[instrument(skip(self), fields(audience = %P::AUDIENCE))]
    pub async fn logout(&self) {
        if self.credentials().has_token(P::AUDIENCE) {
            let request = Request::post(endpoint(P::AUDIENCE, "logout")).for_audience(P::AUDIENCE);
            if let Err(e) = self.inner.dispatcher.send_empty(request).await {
                tracing::warn!(audience = %P::AUDIENCE, error = %e, "Server-side logout failed");
            }
        }

        self.credentials().clear(P::AUDIENCE);
        self.forget();
        self.credentials().set_initialized(P::AUDIENCE, false);
        clear_sentry_user(P::AUDIENCE);
        add_breadcrumb("auth", "logout", &[("audience", P::AUDIENCE.to_string())]);
        tracing::info!(audience = %P::AUDIENCE, "Session ended");
    }
}

impl<P: Principal + std::fmt::Debug> std::fmt::Debug for SessionManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("audience", &P::AUDIENCE)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
