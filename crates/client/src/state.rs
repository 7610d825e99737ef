//! Wiring of the session layer.
//!
//! [`ClientState`] is the explicitly constructed root: it owns the durable
//! store, both credentials, the dispatcher, both session managers, the cart,
//! and the read services. Nothing in the crate is a global; tests build as
//! many independent states as they need.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::cart::Cart;
use crate::catalog::CategoryDirectory;
use crate::checkout::{CheckoutOrchestrator, Notifier};
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::dispatcher::Dispatcher;
use crate::locale::LocalePreference;
use crate::orders::OrderHistory;
use crate::profile::ProfileService;
use crate::session::{AdminSession, CustomerSession};
use crate::storage::{FileStore, KeyValueStore};
use crate::transport::{ReqwestTransport, Transport, TransportError};

/// Shared client state.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct ClientState {
    inner: Arc<ClientStateInner>,
}

struct ClientStateInner {
    config: ClientConfig,
    storage: Arc<dyn KeyValueStore>,
    dispatcher: Dispatcher,
    admin: AdminSession,
    customer: CustomerSession,
    cart: Mutex<Cart>,
    locale: LocalePreference,
    profile: ProfileService,
    orders: OrderHistory,
    categories: CategoryDirectory,
}

impl ClientState {
    /// Build the state over `storage` and `transport` without touching the
    /// network.
    #[must_use]
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let credentials = CredentialStore::load(Arc::clone(&storage));
        let locale = LocalePreference::new(Arc::clone(&storage));
        let dispatcher = Dispatcher::new(
            transport,
            credentials,
            locale.clone(),
            config.api_base(),
            config.prefix.clone(),
            config.unclassified_policy,
        );
        let admin = AdminSession::new(dispatcher.clone());
        let customer = CustomerSession::new(dispatcher.clone());
        let cart = Cart::load(Arc::clone(&storage));
        let profile = ProfileService::new(dispatcher.clone(), customer.clone());
        let orders = OrderHistory::new(dispatcher.clone());
        let categories = CategoryDirectory::new(dispatcher.clone(), config.category_cache_ttl);

        tracing::debug!(
            api_base = %config.api_base(),
            cart_lines = cart.len(),
            "Client state constructed"
        );

        Self {
            inner: Arc::new(ClientStateInner {
                config,
                storage,
                dispatcher,
                admin,
                customer,
                cart: Mutex::new(cart),
                locale,
                profile,
                orders,
                categories,
            }),
        }
    }

    /// Build the state and resolve both persisted sessions.
    ///
    /// The two identity fetches run concurrently. A failure in one is logged
    /// and discards only that audience's session.
    pub async fn bootstrap(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let state = Self::new(config, storage, transport);
        state.refresh_sessions().await;
        state
    }

    /// Bootstrap over the configured state directory and a real HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the HTTP client cannot be built.
    pub async fn from_config(config: ClientConfig) -> Result<Self, TransportError> {
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.state_dir.clone()));
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(config.http_timeout)?);
        Ok(Self::bootstrap(config, storage, transport).await)
    }

    /// Re-fetch both identities concurrently.
    pub async fn refresh_sessions(&self) {
        let (admin, customer) = tokio::join!(
            self.inner.admin.fetch_identity(),
            self.inner.customer.fetch_identity()
        );
        if let Err(e) = admin {
            tracing::warn!(error = %e, "Admin session could not be restored");
        }
        if let Err(e) = customer {
            tracing::warn!(error = %e, "Customer session could not be restored");
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.storage
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        self.inner.dispatcher.credentials()
    }

    #[must_use]
    pub fn admin(&self) -> &AdminSession {
        &self.inner.admin
    }

    #[must_use]
    pub fn customer(&self) -> &CustomerSession {
        &self.inner.customer
    }

    /// Exclusive access to the cart.
    pub async fn cart(&self) -> MutexGuard<'_, Cart> {
        self.inner.cart.lock().await
    }

    #[must_use]
    pub fn locale(&self) -> &LocalePreference {
        &self.inner.locale
    }

    #[must_use]
    pub fn profile(&self) -> &ProfileService {
        &self.inner.profile
    }

    #[must_use]
    pub fn orders(&self) -> &OrderHistory {
        &self.inner.orders
    }

    #[must_use]
    pub fn categories(&self) -> &CategoryDirectory {
        &self.inner.categories
    }

    /// Start a checkout pre-filled from the customer session.
    pub async fn checkout(&self, notifier: Arc<dyn Notifier>) -> CheckoutOrchestrator {
        CheckoutOrchestrator::start(self.inner.dispatcher.clone(), &self.inner.customer, notifier)
            .await
    }
}
