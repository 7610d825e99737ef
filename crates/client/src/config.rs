//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `SHOPDESK_API_BASE_URL` - Backend origin (default: `http://localhost`)
//! - `SHOPDESK_API_PREFIX` - Path prefix for every endpoint (default: `/api`, may be empty)
//! - `SHOPDESK_STATE_DIR` - Directory for durable client state (default: `.shopdesk`)
//! - `SHOPDESK_UNCLASSIFIED_POLICY` - `admin-fallback` (default) or `anonymous`
//! - `SHOPDESK_HTTP_TIMEOUT_SECS` - Request timeout in seconds (default: 30)
//! - `SHOPDESK_CATEGORY_CACHE_SECS` - Category list cache TTL (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::dispatcher::UnclassifiedPolicy;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Commerce client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend origin, without trailing slash
    pub base_url: String,
    /// Normalized path prefix: empty or starting with `/`, never ending with `/`
    pub prefix: String,
    /// Directory backing the durable key-value store
    pub state_dir: PathBuf,
    /// Credential policy for untagged requests to unclassified paths
    pub unclassified_policy: UnclassifiedPolicy,
    /// Per-request timeout
    pub http_timeout: Duration,
    /// How long the category list stays cached
    pub category_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            prefix: "/api".to_string(),
            state_dir: PathBuf::from(".shopdesk"),
            unclassified_policy: UnclassifiedPolicy::default(),
            http_timeout: Duration::from_secs(30),
            category_cache_ttl: Duration::from_secs(300),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = normalize_base_url(&get_env_or_default(
            "SHOPDESK_API_BASE_URL",
            "http://localhost",
        ))?;
        // An explicitly empty prefix is meaningful, so only fall back when unset
        let prefix = normalize_prefix(&get_env_or_default("SHOPDESK_API_PREFIX", "/api"));
        let state_dir = PathBuf::from(get_env_or_default("SHOPDESK_STATE_DIR", ".shopdesk"));
        let unclassified_policy = parse_env_or_default(
            "SHOPDESK_UNCLASSIFIED_POLICY",
            UnclassifiedPolicy::default(),
        )?;
        let http_timeout = Duration::from_secs(parse_env_or_default(
            "SHOPDESK_HTTP_TIMEOUT_SECS",
            30_u64,
        )?);
        let category_cache_ttl = Duration::from_secs(parse_env_or_default(
            "SHOPDESK_CATEGORY_CACHE_SECS",
            300_u64,
        )?);

        Ok(Self {
            base_url,
            prefix,
            state_dir,
            unclassified_policy,
            http_timeout,
            category_cache_ttl,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Base address every endpoint path is appended to: `{base_url}{prefix}`.
    #[must_use]
    pub fn api_base(&self) -> String {
        format!("{}{}", self.base_url, self.prefix)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Trim trailing slashes and check the origin parses as a URL.
fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    Url::parse(trimmed).map_err(|e| {
        ConfigError::InvalidEnvVar("SHOPDESK_API_BASE_URL".to_string(), e.to_string())
    })?;
    Ok(trimmed.to_string())
}

/// Normalize a path prefix to be empty or start with `/`.
#[must_use]
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/api"), "/api");
        assert_eq!(normalize_prefix("api"), "/api");
        assert_eq!(normalize_prefix("api/v1/"), "/api/v1");
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://shop.example.fr/").unwrap(),
            "https://shop.example.fr"
        );
        assert!(normalize_base_url("not a url").is_err());
    }

    #[test]
    fn test_api_base() {
        let config = ClientConfig {
            base_url: "https://shop.example.fr".to_string(),
            prefix: normalize_prefix("api"),
            ..ClientConfig::default()
        };
        assert_eq!(config.api_base(), "https://shop.example.fr/api");

        let config = ClientConfig {
            prefix: String::new(),
            ..ClientConfig::default()
        };
        assert_eq!(config.api_base(), "http://localhost");
    }
}
