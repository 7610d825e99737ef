//! Durable client-side key-value storage.
//!
//! Everything the session layer persists (cart lines, the two audience tokens,
//! the locale preference) goes through [`KeyValueStore`]. Values are opaque
//! strings; callers own their serialization.
//!
//! Two implementations ship with the crate:
//! - [`FileStore`] - one file per key under a state directory, survives restarts
//! - [`MemoryStore`] - process-local, for tests and ephemeral sessions
//!
//! There is no cross-process locking: when two processes share a state
//! directory the last writer wins.

mod file;

pub use file::FileStore;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;

/// Fixed storage keys, namespaced by purpose.
pub mod keys {
    /// Serialized cart line items (JSON array).
    pub const CART: &str = "client_cart";

    /// Admin bearer token.
    pub const ADMIN_TOKEN: &str = "auth_token";

    /// Customer bearer token.
    pub const CUSTOMER_TOKEN: &str = "client_auth_token";

    /// Storefront locale preference.
    pub const LOCALE: &str = "client_locale";

    /// Legacy locale key, read when [`LOCALE`] is absent.
    pub const LEGACY_LOCALE: &str = "locale";
}

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem I/O failed.
    #[error("storage I/O error on {key}: {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The key cannot be mapped onto the backend.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// The backend refused the write (quota, read-only, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A durable string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` when the key was never written or was removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}
