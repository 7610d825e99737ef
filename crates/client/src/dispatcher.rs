//! Dual-audience request dispatcher.
//!
//! Every outbound call goes through [`Dispatcher`], which decides which
//! audience's bearer token (if any) rides along. The decision uses two inputs:
//!
//! 1. The path class: after reducing the target to its path, a path starting
//!    with `/admin` (or `admin`) belongs to the admin audience, one starting
//!    with `/client` (or `client`) to the customer audience, anything else is
//!    unclassified.
//! 2. The request's explicit [`RequestAudience`] tag.
//!
//! | Tag          | Admin path | Customer path | Unclassified path        |
//! |--------------|------------|---------------|--------------------------|
//! | `Admin`      | admin      | refused       | admin                    |
//! | `Customer`   | refused    | customer      | customer                 |
//! | `Anonymous`  | none       | none          | none                     |
//! | `Untagged`   | admin      | customer      | [`UnclassifiedPolicy`]   |
//!
//! A customer token is therefore never sent to an admin path, nor an admin
//! token to a customer path. Tokens are read from the [`CredentialStore`] at
//! send time, so rotation is visible on the next request.
//!
//! A 401 clears the credential that was attached to that request and no
//! other.

use std::sync::Arc;

use reqwest::Method;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shopdesk_core::Audience;
use tracing::instrument;
use url::Url;

use crate::credentials::CredentialStore;
use crate::error::{ApiError, Result};
use crate::locale::LocalePreference;
use crate::transport::{OutboundRequest, RawResponse, Transport};

/// Header carrying the client-generated submission identifier.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Header carrying the storefront locale preference.
pub const LOCALE_HEADER: &str = "X-Client-Locale";

/// Which credential a request is entitled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAudience {
    /// Send the admin token; the path must not be a customer path.
    Admin,
    /// Send the customer token; the path must not be an admin path.
    Customer,
    /// Send no token.
    Anonymous,
    /// Legacy: infer from the path alone.
    Untagged,
}

impl From<Audience> for RequestAudience {
    fn from(audience: Audience) -> Self {
        match audience {
            Audience::Admin => Self::Admin,
            Audience::Customer => Self::Customer,
        }
    }
}

/// What an untagged request to an unclassified path receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnclassifiedPolicy {
    /// Attach the admin token when one is held. Every use is logged.
    #[default]
    AdminFallback,
    /// Attach nothing.
    Anonymous,
}

impl std::str::FromStr for UnclassifiedPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "admin-fallback" | "admin_fallback" => Ok(Self::AdminFallback),
            "anonymous" => Ok(Self::Anonymous),
            _ => Err(format!(
                "invalid policy: {s} (expected admin-fallback or anonymous)"
            )),
        }
    }
}

/// An outbound call before credential attachment.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    audience: RequestAudience,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    idempotency_key: Option<String>,
    require_credential: bool,
}

impl Request {
    /// Create an untagged request.
    #[must_use]
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            audience: RequestAudience::Untagged,
            query: Vec::new(),
            body: None,
            idempotency_key: None,
            require_credential: false,
        }
    }

    /// `GET` request.
    #[must_use]
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    /// `POST` request.
    #[must_use]
    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    /// `PUT` request.
    #[must_use]
    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    /// `DELETE` request.
    #[must_use]
    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    /// Tag the request with an audience.
    #[must_use]
    pub const fn audience(mut self, audience: RequestAudience) -> Self {
        self.audience = audience;
        self
    }

    /// Tag the request as belonging to `audience`.
    #[must_use]
    pub const fn for_audience(self, audience: Audience) -> Self {
        match audience {
            Audience::Admin => self.audience(RequestAudience::Admin),
            Audience::Customer => self.audience(RequestAudience::Customer),
        }
    }

    /// Send without any credential.
    #[must_use]
    pub const fn anonymous(self) -> Self {
        self.audience(RequestAudience::Anonymous)
    }

    /// Fail with [`ApiError::MissingCredential`] instead of sending when the
    /// resolved audience holds no token.
    #[must_use]
    pub const fn require_credential(mut self) -> Self {
        self.require_credential = true;
        self
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set the JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidTarget` if `body` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidTarget(format!("unserializable body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Attach an idempotency key.
    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Target as given by the caller.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Audience tag.
    #[must_use]
    pub const fn tag(&self) -> RequestAudience {
        self.audience
    }
}

/// Reduce a target to the path used for classification.
///
/// Absolute URLs contribute only their path, with the configured API prefix
/// stripped so `https://host/api/admin/x` classifies like `/admin/x`. The
/// path is percent-decoded, and any `.` or `..` segment is refused: the
/// server would resolve it to a different path than the one classified.
///
/// # Errors
///
/// Returns `ApiError::InvalidTarget` for an empty target, a path that does
/// not decode to UTF-8, or a path with dot segments.
pub fn normalize_path(target: &str, prefix: &str) -> Result<String> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ApiError::InvalidTarget("empty target".to_string()));
    }

    let raw = match Url::parse(target) {
        Ok(url) if url.has_host() => {
            let path = url.path();
            let stripped = if prefix.is_empty() {
                path
            } else {
                path.strip_prefix(prefix).unwrap_or(path)
            };
            stripped.to_string()
        }
        _ => target
            .split(['?', '#'])
            .next()
            .unwrap_or(target)
            .to_string(),
    };

    let path = urlencoding::decode(&raw)
        .map_err(|_| ApiError::InvalidTarget(format!("undecodable path: {raw}")))?;
    if path
        .split(['/', '\\'])
        .any(|segment| segment == "." || segment == "..")
    {
        return Err(ApiError::InvalidTarget(format!(
            "dot segment in path: {target}"
        )));
    }
    Ok(path.into_owned())
}

/// Audience a normalized path belongs to, `None` when unclassified.
#[must_use]
pub fn classify_path(path: &str) -> Option<Audience> {
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.starts_with("admin") {
        Some(Audience::Admin)
    } else if path.starts_with("client") {
        Some(Audience::Customer)
    } else {
        None
    }
}

/// Routing decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Normalized path.
    pub path: String,
    /// Audience whose credential should be attached, if any.
    pub credential: Option<Audience>,
}

/// Single outbound request gateway.
///
/// Cheap to clone; clones share the transport and credential store.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
    locale: LocalePreference,
    api_base: String,
    prefix: String,
    policy: UnclassifiedPolicy,
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// `api_base` is `{base_url}{prefix}`; `prefix` is kept separately to
    /// recognize absolute URLs pointing at the same API.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: CredentialStore,
        locale: LocalePreference,
        api_base: impl Into<String>,
        prefix: impl Into<String>,
        policy: UnclassifiedPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                transport,
                credentials,
                locale,
                api_base: api_base.into().trim_end_matches('/').to_string(),
                prefix: prefix.into(),
                policy,
            }),
        }
    }

    /// Credential store the dispatcher reads from.
    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    /// Decide which credential `request` receives, without sending it.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::AudienceMismatch` when the tag contradicts the path,
    /// or `ApiError::InvalidTarget` for an empty target.
    pub fn route(&self, request: &Request) -> Result<Route> {
        let path = normalize_path(&request.target, &self.inner.prefix)?;
        let class = classify_path(&path);

        let credential = match (request.audience, class) {
            (RequestAudience::Anonymous, _) => None,
            (RequestAudience::Admin, Some(Audience::Customer)) => {
                return Err(ApiError::AudienceMismatch {
                    path,
                    tag: Audience::Admin,
                    class: Audience::Customer,
                });
            }
            (RequestAudience::Customer, Some(Audience::Admin)) => {
                return Err(ApiError::AudienceMismatch {
                    path,
                    tag: Audience::Customer,
                    class: Audience::Admin,
                });
            }
            (RequestAudience::Admin, _) => Some(Audience::Admin),
            (RequestAudience::Customer, _) => Some(Audience::Customer),
            (RequestAudience::Untagged, Some(audience)) => Some(audience),
            (RequestAudience::Untagged, None) => match self.inner.policy {
                UnclassifiedPolicy::AdminFallback => {
                    if self.inner.credentials.has_token(Audience::Admin) {
                        tracing::warn!(
                            path = %path,
                            "Untagged request to unclassified path receives the admin credential"
                        );
                    }
                    Some(Audience::Admin)
                }
                UnclassifiedPolicy::Anonymous => None,
            },
        };

        Ok(Route { path, credential })
    }

    fn url_for(&self, target: &str) -> String {
        if Url::parse(target).is_ok_and(|url| url.has_host()) {
            return target.to_string();
        }
        if target.starts_with('/') {
            format!("{}{target}", self.inner.api_base)
        } else {
            format!("{}/{target}", self.inner.api_base)
        }
    }

    /// Send `request` and return the raw 2xx response.
    ///
    /// # Errors
    ///
    /// Returns the matching `ApiError` for routing refusals, transport
    /// failures, and non-2xx statuses.
    #[instrument(skip(self, request), fields(method = %request.method, target = %request.target))]
    pub async fn send(&self, request: Request) -> Result<RawResponse> {
        let route = self.route(&request)?;

        let token = route
            .credential
            .and_then(|audience| self.inner.credentials.token(audience));
        if request.require_credential
            && token.is_none()
            && let Some(audience) = route.credential
        {
            return Err(ApiError::MissingCredential(audience));
        }
        // Only an audience whose token actually rode along can be blamed for a 401
        let attached = token.as_ref().and(route.credential);

        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(token) = &token {
            headers.push((
                "Authorization".to_string(),
                format!("Bearer {}", token.expose_secret()),
            ));
        }
        if let Some(locale) = self.inner.locale.get() {
            headers.push((LOCALE_HEADER.to_string(), locale));
        }
        if let Some(key) = &request.idempotency_key {
            headers.push((IDEMPOTENCY_HEADER.to_string(), key.clone()));
        }

        let outbound = OutboundRequest {
            method: request.method.clone(),
            url: self.url_for(request.target.trim()),
            query: request.query,
            headers,
            body: request.body,
        };

        let response = self.inner.transport.send(outbound).await.map_err(|e| {
            tracing::warn!(path = %route.path, error = %e, "Request failed without a response");
            ApiError::from(e)
        })?;

        if response.is_success() {
            tracing::debug!(path = %route.path, status = response.status, "Request succeeded");
            return Ok(response);
        }

        if response.status == 401
            && let (Some(audience), Some(sent)) = (attached, &token)
        {
            if self.inner.credentials.clear_if_current(audience, sent) {
                tracing::warn!(%audience, path = %route.path, "Credential rejected, clearing it");
            } else {
                tracing::debug!(%audience, path = %route.path, "Rejected credential was already replaced");
            }
        }

        let error = ApiError::from_response(&response, attached);
        tracing::debug!(path = %route.path, status = response.status, error = %error, "Request rejected");
        Err(error)
    }

    /// Send `request` and decode the 2xx body as `T`.
    ///
    /// # Errors
    ///
    /// As [`Dispatcher::send`], plus `ApiError::Decode` when the body does
    /// not match `T`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let target = request.target.clone();
        let response = self.send(request).await?;
        serde_json::from_str(&response.body).map_err(|source| {
            tracing::error!(
                target = %target,
                error = %source,
                body = %response.body.chars().take(500).collect::<String>(),
                "Response failed schema validation"
            );
            ApiError::Decode {
                path: target,
                source,
            }
        })
    }

    /// Send `request`, ignoring the 2xx body.
    ///
    /// # Errors
    ///
    /// As [`Dispatcher::send`].
    pub async fn send_empty(&self, request: Request) -> Result<()> {
        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::storage::MemoryStore;
    use crate::testing::ScriptedTransport;
    use crate::transport::TransportError;

    fn setup(policy: UnclassifiedPolicy) -> (Dispatcher, CredentialStore, Arc<ScriptedTransport>) {
        let storage = Arc::new(MemoryStore::new());
        let credentials = CredentialStore::load(storage.clone());
        let transport = Arc::new(ScriptedTransport::new());
        let dispatcher = Dispatcher::new(
            transport.clone(),
            credentials.clone(),
            LocalePreference::new(storage),
            "https://shop.example.fr/api",
            "/api",
            policy,
        );
        (dispatcher, credentials, transport)
    }

    fn both_tokens(credentials: &CredentialStore) {
        credentials.set_token(Audience::Admin, SecretString::from("adm-token"));
        credentials.set_token(Audience::Customer, SecretString::from("cus-token"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/admin/orders", "/api").unwrap(), "/admin/orders");
        assert_eq!(
            normalize_path("https://shop.example.fr/api/client/orders?page=2", "/api").unwrap(),
            "/client/orders"
        );
        assert_eq!(
            normalize_path("https://cdn.example.fr/reports", "/api").unwrap(),
            "/reports"
        );
        assert!(normalize_path("  ", "/api").is_err());
    }

    #[test]
    fn test_normalize_path_decodes_and_refuses_dot_segments() {
        assert_eq!(
            normalize_path("/%63lient/orders", "/api").unwrap(),
            "/client/orders"
        );
        assert_eq!(
            normalize_path("/client/orders?ref=../admin", "/api").unwrap(),
            "/client/orders"
        );
        for target in [
            "/client/../admin/orders",
            "/admin/../client/orders",
            "client/%2e%2e/admin/orders",
            "/client/..%2Fadmin/orders",
            "/client\\..\\admin/orders",
            "/./admin/orders",
        ] {
            assert!(
                matches!(
                    normalize_path(target, "/api"),
                    Err(ApiError::InvalidTarget(_))
                ),
                "{target} should be refused"
            );
        }
    }

    #[tokio::test]
    async fn test_dot_segments_cannot_move_a_token_across_audiences() {
        let (dispatcher, credentials, transport) = setup(UnclassifiedPolicy::AdminFallback);
        both_tokens(&credentials);

        for target in ["/client/../admin/orders", "/admin/../client/orders"] {
            let err = dispatcher.send(Request::get(target)).await.unwrap_err();
            assert!(matches!(err, ApiError::InvalidTarget(_)));
        }

        assert!(transport.requests().is_empty());
        assert!(credentials.has_token(Audience::Admin));
        assert!(credentials.has_token(Audience::Customer));
    }

    #[tokio::test]
    async fn test_percent_encoded_customer_path_gets_customer_token() {
        let (dispatcher, credentials, transport) = setup(UnclassifiedPolicy::AdminFallback);
        both_tokens(&credentials);
        transport.push_json(200, "[]");

        dispatcher.send(Request::get("/%63lient/orders")).await.unwrap();

        assert_eq!(
            transport.last_request().unwrap().header("Authorization"),
            Some("Bearer cus-token")
        );
    }

    #[test]
    fn test_classify_path() {
        assert_eq!(classify_path("/admin/orders"), Some(Audience::Admin));
        assert_eq!(classify_path("admin"), Some(Audience::Admin));
        assert_eq!(classify_path("/client/orders"), Some(Audience::Customer));
        assert_eq!(classify_path("client/checkout"), Some(Audience::Customer));
        assert_eq!(classify_path("/reports"), None);
        assert_eq!(classify_path("/"), None);
    }

    #[tokio::test]
    async fn test_admin_path_gets_only_admin_token() {
        let (dispatcher, credentials, transport) = setup(UnclassifiedPolicy::AdminFallback);
        both_tokens(&credentials);
        transport.push_json(200, "[]");

        dispatcher.send(Request::get("/admin/orders")).await.unwrap();

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url, "https://shop.example.fr/api/admin/orders");
        assert_eq!(sent.header("Authorization"), Some("Bearer adm-token"));
        assert_eq!(sent.header("Accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_customer_path_gets_only_customer_token() {
        let (dispatcher, credentials, transport) = setup(UnclassifiedPolicy::AdminFallback);
        both_tokens(&credentials);
        transport.push_json(200, "[]");

        dispatcher.send(Request::get("client/orders")).await.unwrap();

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url, "https://shop.example.fr/api/client/orders");
        assert_eq!(sent.header("Authorization"), Some("Bearer cus-token"));
    }

    #[tokio::test]
    async fn test_unclassified_path_falls_back_to_admin_token() {
        let (dispatcher, credentials, transport) = setup(UnclassifiedPolicy::AdminFallback);
        both_tokens(&credentials);
        transport.push_json(200, "{}");
        dispatcher.send(Request::get("/reports")).await.unwrap();
        assert_eq!(
            transport.last_request().unwrap().header("Authorization"),
            Some("Bearer adm-token")
        );

        credentials.clear(Audience::Admin);
        transport.push_json(200, "{}");
        dispatcher.send(Request::get("/reports")).await.unwrap();
        assert_eq!(transport.last_request().unwrap().header("Authorization"), None);
    }

    #[tokio::test]
    async fn test_anonymous_policy_sends_nothing_to_unclassified_paths() {
        let (dispatcher, credentials, transport) = setup(UnclassifiedPolicy::Anonymous);
        both_tokens(&credentials);
        transport.push_json(200, "{}");

        dispatcher.send(Request::get("/reports")).await.unwrap();

        assert_eq!(transport.last_request().unwrap().header("Authorization"), None);
    }

    #[tokio::test]
    async fn test_missing_token_sends_no_authorization_header() {
        let (dispatcher, credentials, transport) = setup(UnclassifiedPolicy::AdminFallback);
        credentials.set_token(Audience::Admin, SecretString::from("adm-token"));
        transport.push_json(200, "{}");

        dispatcher.send(Request::get("/client/products")).await.unwrap();

        assert_eq!(transport.last_request().unwrap().header("Authorization"), None);
    }

    #[tokio::test]
    async fn test_mismatched_tag_is_refused_without_sending() {
        let (dispatcher, credentials, transport) = setup(UnclassifiedPolicy::AdminFallback);
        both_tokens(&credentials);

        let err = dispatcher
            .send(Request::get("/admin/orders").for_audience(Audience::Customer))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::AudienceMismatch { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_tagged_unclassified_path_uses_the_tag() {
        let (dispatcher, credentials, transport) = setup(UnclassifiedPolicy::AdminFallback);
        both_tokens(&credentials);
        transport.push_json(200, "{}");

        dispatcher
            .send(Request::get("/reports").for_audience(Audience::Customer))
            .await
            .unwrap();

        assert_eq!(
            transport.last_request().unwrap().header("Authorization"),
            Some("Bearer cus-token")
        );
    }

    #[tokio::test]
    async fn test_unauthorized_clears_only_the_attached_credential() {
        let (dispatcher, credentials, transport) = setup(UnclassifiedPolicy::AdminFallback);
        both_tokens(&credentials);
        transport.push_json(401, r#"{"message":"Unauthenticated."}"#);

        let err = dispatcher.send(Request::get("/client/me")).await.unwrap_err();

        assert!(matches!(
            err,
            ApiError::Unauthorized {
                audience: Some(Audience::Customer),
                ..
            }
        ));
        assert!(!credentials.has_token(Audience::Customer));
        assert!(credentials.has_token(Audience::Admin));
    }

    #[tokio::test]
    async fn test_token_rotation_is_visible_on_next_request() {
        let (dispatcher, credentials, transport) = setup(UnclassifiedPolicy::AdminFallback);
        credentials.set_token(Audience::Customer, SecretString::from("old"));
        credentials.set_token(Audience::Customer, SecretString::from("new"));
        transport.push_json(200, "{}");

        dispatcher.send(Request::get("/client/me")).await.unwrap();

        assert_eq!(
            transport.last_request().unwrap().header("Authorization"),
            Some("Bearer new")
        );
    }

    #[tokio::test]
    async fn test_require_credential() {
        let (dispatcher, _credentials, transport) = setup(UnclassifiedPolicy::AdminFallback);

        let err = dispatcher
            .send(Request::get("/client/profile").require_credential())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::MissingCredential(Audience::Customer)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_and_decode_failure() {
        let (dispatcher, _credentials, transport) = setup(UnclassifiedPolicy::AdminFallback);
        transport.push_failure(TransportError::Timeout);
        let err = dispatcher.send(Request::get("/client/me")).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(TransportError::Timeout)));

        transport.push_json(200, r#"{"unexpected": true}"#);
        let err = dispatcher
            .send_json::<Vec<u32>>(Request::get("/client/orders"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_query_body_and_idempotency_key_are_forwarded() {
        let (dispatcher, _credentials, transport) = setup(UnclassifiedPolicy::AdminFallback);
        transport.push_json(201, "{}");

        let request = Request::post("/client/checkout")
            .query("page", 2)
            .idempotency_key("key-1")
            .json(&serde_json::json!({"items": []}))
            .unwrap();
        dispatcher.send(request).await.unwrap();

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(sent.header(IDEMPOTENCY_HEADER), Some("key-1"));
        assert_eq!(sent.body, Some(serde_json::json!({"items": []})));
    }
}
