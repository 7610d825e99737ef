//! Category list for back-office dropdowns.
//!
//! The list changes rarely and every product form asks for it, so it is
//! cached in memory with `moka` for the configured TTL.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use shopdesk_core::{Audience, CategoryId};
use tracing::{debug, instrument};

use crate::dispatcher::{Dispatcher, Request};
use crate::error::Result;

const CATEGORIES_KEY: &str = "categories";

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub position: Option<i32>,
}

const fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
struct CategoryList {
    #[serde(default)]
    data: Vec<Category>,
}

/// Cached reader of `GET /admin/categories`.
#[derive(Clone)]
pub struct CategoryDirectory {
    inner: Arc<CategoryDirectoryInner>,
}

struct CategoryDirectoryInner {
    dispatcher: Dispatcher,
    cache: Cache<&'static str, Arc<Vec<Category>>>,
}

impl CategoryDirectory {
    #[must_use]
    pub fn new(dispatcher: Dispatcher, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self {
            inner: Arc::new(CategoryDirectoryInner { dispatcher, cache }),
        }
    }

    /// All categories, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingCredential` without an admin session, or the
    /// dispatcher error. Failures are not cached.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Arc<Vec<Category>>> {
        if let Some(categories) = self.inner.cache.get(CATEGORIES_KEY).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let request = Request::get("/admin/categories")
            .for_audience(Audience::Admin)
            .require_credential();
        let list: CategoryList = self.inner.dispatcher.send_json(request).await?;
        let categories = Arc::new(list.data);
        self.inner
            .cache
            .insert(CATEGORIES_KEY, Arc::clone(&categories))
            .await;
        Ok(categories)
    }

    /// `(label, id)` pairs for a parent-category dropdown, active categories
    /// only.
    ///
    /// # Errors
    ///
    /// As [`CategoryDirectory::list`].
    pub async fn options(&self) -> Result<Vec<(String, CategoryId)>> {
        Ok(self
            .list()
            .await?
            .iter()
            .filter(|category| category.is_active)
            .map(|category| (category.name.clone(), category.id.clone()))
            .collect())
    }

    /// Drop the cached list; the next read goes to the server.
    pub async fn invalidate(&self) {
        self.inner.cache.invalidate(CATEGORIES_KEY).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::credentials::CredentialStore;
    use crate::dispatcher::UnclassifiedPolicy;
    use crate::locale::LocalePreference;
    use crate::storage::MemoryStore;
    use crate::testing::ScriptedTransport;

    const CATEGORIES: &str = r#"{"data":[
        {"id":1,"name":"Mugs","slug":"mugs","is_active":true,"position":1},
        {"id":2,"name":"Archive","parent_id":1,"is_active":false}
    ]}"#;

    fn setup() -> (CategoryDirectory, Arc<ScriptedTransport>) {
        let storage = Arc::new(MemoryStore::new());
        let credentials = CredentialStore::load(storage.clone());
        credentials.set_token(Audience::Admin, SecretString::from("adm-1"));
        let transport = Arc::new(ScriptedTransport::new());
        let dispatcher = Dispatcher::new(
            transport.clone(),
            credentials,
            LocalePreference::new(storage),
            "https://shop.example.fr/api",
            "/api",
            UnclassifiedPolicy::AdminFallback,
        );
        (
            CategoryDirectory::new(dispatcher, Duration::from_secs(300)),
            transport,
        )
    }

    #[tokio::test]
    async fn test_list_is_cached_until_invalidated() {
        let (directory, transport) = setup();
        transport.push_json(200, CATEGORIES);
        transport.push_json(200, r#"{"data":[]}"#);

        assert_eq!(directory.list().await.unwrap().len(), 2);
        assert_eq!(directory.list().await.unwrap().len(), 2);
        assert_eq!(transport.requests().len(), 1);

        directory.invalidate().await;
        assert!(directory.list().await.unwrap().is_empty());
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_options_skip_inactive_categories() {
        let (directory, transport) = setup();
        transport.push_json(200, CATEGORIES);

        let options = directory.options().await.unwrap();

        assert_eq!(options, vec![("Mugs".to_string(), CategoryId::from(1))]);
        assert_eq!(
            transport.last_request().unwrap().header("Authorization"),
            Some("Bearer adm-1")
        );
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (directory, transport) = setup();
        transport.push_json(503, "");
        transport.push_json(200, CATEGORIES);

        assert!(directory.list().await.is_err());
        assert_eq!(directory.list().await.unwrap().len(), 2);
    }
}
