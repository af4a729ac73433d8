//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DINESPHERE_BASE_URL` - Backend root (e.g. `https://api.dinesphere.app/`)
//!
//! ## Optional
//! - `DINESPHERE_RESTAURANT_URL` - Menu endpoints root (default: `<base>/restaurant/`)
//! - `DINESPHERE_DATABASE_URL` - Local cache (default: `sqlite://dinesphere.db`)
//! - `DINESPHERE_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `DINESPHERE_NEARBY_RADIUS_KM` - Nearby/other boundary (default: 5.0)
//! - `DINESPHERE_CLEAR_POLICY` - `retain-failed` (default) or `clear-on-dispatch`
//! - `DINESPHERE_LOG_JSON` - Emit JSON logs when set
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::time::Duration;

use dinesphere_core::NEARBY_RADIUS_KM;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::services::sync::ClearPolicy;

const DEFAULT_DATABASE_URL: &str = "sqlite://dinesphere.db";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const RESTAURANT_PATH: &str = "restaurant/";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Where the backend lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Root for account, listing, saved, review and notification scripts.
    pub base_url: Url,
    /// Root for the category and menu scripts.
    pub restaurant_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl BackendConfig {
    /// Backend config rooted at `base_url`, with the default restaurant
    /// root and timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = parse_base_url("DINESPHERE_BASE_URL", base_url)?;
        let restaurant_url = default_restaurant_url(&base_url)?;
        Ok(Self {
            base_url,
            restaurant_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }
}

/// Client application configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Backend endpoints.
    pub backend: BackendConfig,
    /// `SQLite` connection string for the local cache.
    pub database_url: String,
    /// Distance in km separating nearby from other restaurants offline.
    pub nearby_radius_km: f64,
    /// What reconciliation does with failed replays.
    pub clear_policy: ClearPolicy,
    /// Emit JSON logs.
    pub log_json: bool,
    /// Sentry DSN for error tracking (contains the project key)
    pub sentry_dsn: Option<SecretString>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("backend", &self.backend)
            .field("database_url", &self.database_url)
            .field("nearby_radius_km", &self.nearby_radius_km)
            .field("clear_policy", &self.clear_policy)
            .field("log_json", &self.log_json)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an explicit map of variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get_required_env = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };
        let get_optional_env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_env_or_default =
            |key: &str, default: &str| get_optional_env(key).unwrap_or_else(|| default.to_string());

        let base_url = parse_base_url("DINESPHERE_BASE_URL", &get_required_env("DINESPHERE_BASE_URL")?)?;
        let restaurant_url = match get_optional_env("DINESPHERE_RESTAURANT_URL") {
            Some(raw) => parse_base_url("DINESPHERE_RESTAURANT_URL", &raw)?,
            None => default_restaurant_url(&base_url)?,
        };

        let timeout_secs = get_env_or_default(
            "DINESPHERE_HTTP_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("DINESPHERE_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
        })?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "DINESPHERE_HTTP_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let nearby_radius_km = match get_optional_env("DINESPHERE_NEARBY_RADIUS_KM") {
            Some(raw) => parse_radius(&raw)?,
            None => NEARBY_RADIUS_KM,
        };

        let clear_policy = match get_optional_env("DINESPHERE_CLEAR_POLICY") {
            Some(raw) => raw.parse::<ClearPolicy>().map_err(|e| {
                ConfigError::InvalidEnvVar("DINESPHERE_CLEAR_POLICY".to_string(), e)
            })?,
            None => ClearPolicy::default(),
        };

        Ok(Self {
            backend: BackendConfig {
                base_url,
                restaurant_url,
                timeout: Duration::from_secs(timeout_secs),
            },
            database_url: get_env_or_default("DINESPHERE_DATABASE_URL", DEFAULT_DATABASE_URL),
            nearby_radius_km,
            clear_policy,
            log_json: get_optional_env("DINESPHERE_LOG_JSON").is_some(),
            sentry_dsn: get_optional_env("SENTRY_DSN").map(SecretString::from),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

/// Parse a root URL and make sure it ends with `/` so relative script
/// names join underneath it instead of replacing its last segment.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

fn default_restaurant_url(base_url: &Url) -> Result<Url, ConfigError> {
    base_url.join(RESTAURANT_PATH).map_err(|e| {
        ConfigError::InvalidEnvVar("DINESPHERE_RESTAURANT_URL".to_string(), e.to_string())
    })
}

fn parse_radius(raw: &str) -> Result<f64, ConfigError> {
    let radius = raw.trim().parse::<f64>().map_err(|e| {
        ConfigError::InvalidEnvVar("DINESPHERE_NEARBY_RADIUS_KM".to_string(), e.to_string())
    })?;
    if !radius.is_finite() || radius <= 0.0 {
        return Err(ConfigError::InvalidEnvVar(
            "DINESPHERE_NEARBY_RADIUS_KM".to_string(),
            "must be a positive number".to_string(),
        ));
    }
    Ok(radius)
}
