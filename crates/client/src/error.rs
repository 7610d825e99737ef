//! Unified error handling with Sentry integration.
//!
//! [`ApiError`] is the explicit result of every dispatched request: either the
//! typed payload or one of these kinds. Nothing in the session layer panics or
//! silently defaults on a bad response.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde::Deserialize;
use shopdesk_core::Audience;
use thiserror::Error;

use crate::transport::{RawResponse, TransportError};

/// Coarse classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response was received.
    Transport,
    /// The server rejected the input (400/422).
    Validation,
    /// The credential was missing, expired, or revoked (401).
    Authentication,
    /// The server refused or could not find the resource (403/404/other 4xx).
    Rejected,
    /// The server failed (5xx).
    Server,
    /// A 2xx body did not match the expected schema.
    Decode,
    /// The request was refused locally before sending.
    Routing,
}

/// Error returned by the dispatcher and everything built on it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network/transport failure; no response.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Input rejected by the server, optionally with per-field messages.
    #[error("Validation failed ({status}): {message}")]
    Validation {
        /// HTTP status (400 or 422).
        status: u16,
        /// Top-level message.
        message: String,
        /// Field name to messages.
        field_errors: BTreeMap<String, Vec<String>>,
    },

    /// The server answered 401. The credential that was attached, if any,
    /// has already been cleared.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Audience whose credential was attached to the request.
        audience: Option<Audience>,
        /// Server message.
        message: String,
    },

    /// The server answered 403.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The server answered 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server answered 5xx.
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Server message or body excerpt.
        message: String,
    },

    /// Any other non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status.
        status: u16,
        /// Server message or body excerpt.
        message: String,
    },

    /// A 2xx body failed schema validation.
    #[error("Malformed response from {path}: {source}")]
    Decode {
        /// Endpoint path.
        path: String,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// The request's explicit audience contradicts its path.
    #[error("Refusing to send {tag} credentials to {path} ({class} endpoint)")]
    AudienceMismatch {
        /// Normalized path.
        path: String,
        /// Audience the caller tagged the request with.
        tag: Audience,
        /// Audience the path belongs to.
        class: Audience,
    },

    /// The request requires a credential that is not held.
    #[error("No {0} session")]
    MissingCredential(Audience),

    /// The target could not be turned into a path.
    #[error("Invalid request target: {0}")]
    InvalidTarget(String),
}

/// Result type alias for `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Unauthorized { .. } => ErrorKind::Authentication,
            Self::Forbidden(_) | Self::NotFound(_) | Self::Http { .. } => ErrorKind::Rejected,
            Self::Server { .. } => ErrorKind::Server,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::AudienceMismatch { .. } | Self::MissingCredential(_) | Self::InvalidTarget(_) => {
                ErrorKind::Routing
            }
        }
    }

    /// Whether resubmitting the same request later could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Server)
    }

    /// Per-field validation messages, empty for other kinds.
    #[must_use]
    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            Self::Validation { field_errors, .. } => Some(field_errors),
            _ => None,
        }
    }

    /// Build the error for a non-2xx response.
    ///
    /// `audience` is the audience whose credential was attached.
    #[must_use]
    pub fn from_response(response: &RawResponse, audience: Option<Audience>) -> Self {
        let status = response.status;
        let body: ErrorBody = serde_json::from_str(&response.body).unwrap_or_default();
        let message = body
            .message
            .or(body.error)
            .unwrap_or_else(|| excerpt(&response.body));

        match status {
            400 | 422 => Self::Validation {
                status,
                message,
                field_errors: body.errors,
            },
            401 => Self::Unauthorized { audience, message },
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Http { status, message },
        }
    }
}

/// Conventional JSON error body: `{ "message": ..., "errors": { field: [..] } }`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: BTreeMap<String, Vec<String>>,
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "(empty body)".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

/// Users signed in per audience, most recently established last.
#[derive(Debug)]
struct SentryUsers {
    users: Vec<(Audience, sentry::User)>,
}

impl SentryUsers {
    const fn new() -> Self {
        Self { users: Vec::new() }
    }

    fn set(&mut self, audience: Audience, user: sentry::User) {
        self.users.retain(|(held, _)| *held != audience);
        self.users.push((audience, user));
    }

    /// Forget `audience` and return the user that should stay attached.
    fn clear(&mut self, audience: Audience) -> Option<(Audience, sentry::User)> {
        self.users.retain(|(held, _)| *held != audience);
        self.users.last().cloned()
    }
}

static SENTRY_USERS: Mutex<SentryUsers> = Mutex::new(SentryUsers::new());

fn audience_user_tag(audience: Audience) -> String {
    format!("{audience}_user")
}

/// Set the Sentry user context after a successful login.
///
/// Both audiences can be signed in at once; the most recent one becomes the
/// Sentry user and each keeps its own `{audience}_user` tag.
pub fn set_sentry_user(audience: Audience, user_id: &impl ToString, email: Option<&str>) {
    let user = sentry::User {
        id: Some(user_id.to_string()),
        email: email.map(String::from),
        ..Default::default()
    };
    SENTRY_USERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .set(audience, user.clone());

    sentry::configure_scope(|scope| {
        scope.set_tag(&audience_user_tag(audience), user_id.to_string());
        scope.set_user(Some(user));
        scope.set_tag("audience", audience);
    });
}

/// Clear the Sentry user context of `audience` on logout.
///
/// If the other audience is still signed in, its user takes over.
pub fn clear_sentry_user(audience: Audience) {
    let remaining = SENTRY_USERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear(audience);

    sentry::configure_scope(|scope| {
        scope.remove_tag(&audience_user_tag(audience));
        match remaining {
            Some((other, user)) => {
                scope.set_user(Some(user));
                scope.set_tag("audience", other);
            }
            None => {
                scope.set_user(None);
                scope.remove_tag("audience");
            }
        }
    });
}

/// Add a breadcrumb for a user action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String(value.clone()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(id: &str) -> sentry::User {
        sentry::User {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_logout_of_one_audience_keeps_the_other_sentry_user() {
        let mut users = SentryUsers::new();
        users.set(Audience::Admin, user("1"));
        users.set(Audience::Customer, user("7"));

        let (audience, remaining) = users.clear(Audience::Customer).unwrap();
        assert_eq!(audience, Audience::Admin);
        assert_eq!(remaining.id.as_deref(), Some("1"));

        assert!(users.clear(Audience::Admin).is_none());
    }

    #[test]
    fn test_relogin_replaces_the_audience_user() {
        let mut users = SentryUsers::new();
        users.set(Audience::Customer, user("7"));
        users.set(Audience::Admin, user("1"));
        users.set(Audience::Customer, user("8"));

        let (audience, remaining) = users.clear(Audience::Admin).unwrap();
        assert_eq!(audience, Audience::Customer);
        assert_eq!(remaining.id.as_deref(), Some("8"));
    }

    #[test]
    fn test_validation_error_keeps_field_messages() {
        let response = RawResponse::new(
            422,
            r#"{"message":"The given data was invalid.","errors":{"customer.email":["required"]}}"#,
        );
        let err = ApiError::from_response(&response, Some(Audience::Customer));

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "Validation failed (422): The given data was invalid.");
        let fields = err.field_errors().cloned().unwrap_or_default();
        assert_eq!(fields["customer.email"], vec!["required".to_string()]);
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (401, ErrorKind::Authentication),
            (403, ErrorKind::Rejected),
            (404, ErrorKind::Rejected),
            (409, ErrorKind::Rejected),
            (400, ErrorKind::Validation),
            (502, ErrorKind::Server),
        ];
        for (status, kind) in cases {
            let err = ApiError::from_response(&RawResponse::new(status, ""), None);
            assert_eq!(err.kind(), kind, "status {status}");
        }
    }

    #[test]
    fn test_non_json_body_becomes_excerpt() {
        let err = ApiError::from_response(&RawResponse::new(500, "<html>boom</html>"), None);
        assert_eq!(err.to_string(), "Server error (500): <html>boom</html>");

        let err = ApiError::from_response(&RawResponse::new(503, "  "), None);
        assert_eq!(err.to_string(), "Server error (503): (empty body)");
    }

    #[test]
    fn test_retryable() {
        assert!(ApiError::Transport(TransportError::Timeout).is_retryable());
        assert!(!ApiError::MissingCredential(Audience::Admin).is_retryable());
        assert!(!ApiError::NotFound("x".to_string()).is_retryable());
    }
}
