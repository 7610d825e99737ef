//! Integration tests for shopdesk.
//!
//! The tests drive a complete [`ClientState`] over an in-memory store and a
//! scripted transport, so they need neither a network nor a backend.
//!
//! ```bash
//! cargo test -p shopdesk-integration-tests
//! ```

use std::sync::Arc;

use rust_decimal::Decimal;
use shopdesk_client::ClientState;
use shopdesk_client::cart::ProductSnapshot;
use shopdesk_client::config::ClientConfig;
use shopdesk_client::storage::MemoryStore;
use shopdesk_client::testing::ScriptedTransport;
use shopdesk_core::ProductId;

/// A client state with handles on its store and transport.
pub struct TestClient {
    pub state: ClientState,
    pub storage: Arc<MemoryStore>,
    pub transport: Arc<ScriptedTransport>,
}

impl TestClient {
    /// Build without touching the transport.
    #[must_use]
    pub fn new(storage: MemoryStore) -> Self {
        let storage = Arc::new(storage);
        let transport = Arc::new(ScriptedTransport::new());
        let state = ClientState::new(config(), storage.clone(), transport.clone());
        Self {
            state,
            storage,
            transport,
        }
    }

    /// Build and restore persisted sessions. Responses for the identity
    /// fetches must already be queued on `transport`.
    pub async fn bootstrap(storage: MemoryStore, transport: ScriptedTransport) -> Self {
        let storage = Arc::new(storage);
        let transport = Arc::new(transport);
        let state = ClientState::bootstrap(config(), storage.clone(), transport.clone()).await;
        Self {
            state,
            storage,
            transport,
        }
    }

    /// A second state over the same store, as after a restart.
    #[must_use]
    pub fn restart(&self) -> Self {
        let transport = Arc::new(ScriptedTransport::new());
        let state = ClientState::new(config(), self.storage.clone(), transport.clone());
        Self {
            state,
            storage: self.storage.clone(),
            transport,
        }
    }
}

/// Configuration pointing at `https://shop.example.fr/api`.
#[must_use]
pub fn config() -> ClientConfig {
    ClientConfig {
        base_url: "https://shop.example.fr".to_string(),
        ..ClientConfig::default()
    }
}

/// A product priced in whole euros.
#[must_use]
pub fn product(id: i64, name: &str, price: i64) -> ProductSnapshot {
    ProductSnapshot {
        id: ProductId::from(id),
        slug: None,
        name: name.to_string(),
        price: Decimal::from(price),
        image_url: None,
        variant: None,
    }
}
