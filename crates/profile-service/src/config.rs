//! Profile service configuration.
//!
//! Configuration is loaded from environment variables. The Redis URL may
//! carry credentials and is redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default identity service base URL.
pub const DEFAULT_IDENTITY_SERVICE_URL: &str = "http://localhost:8081";

/// Default JWKS endpoint path on the identity service.
pub const DEFAULT_JWKS_ENDPOINT: &str = "/.well-known/jwks.json";

/// Default JWKS refresh interval in milliseconds (5 minutes).
pub const DEFAULT_JWKS_REFRESH_INTERVAL_MS: u64 = 300_000;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Issuer expected on incoming tokens. Mismatch is a warning, not a rejection.
pub const DEFAULT_EXPECTED_ISSUER: &str = "ecom-identity";

/// Profile service configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Redis URL is redacted in Debug output to prevent credential leakage.
#[derive(Clone)]
pub struct Config {
    /// Identity service base URL (JWKS source).
    pub identity_service_url: String,

    /// JWKS endpoint path, appended to the identity service URL.
    pub jwks_endpoint: String,

    /// Background JWKS refresh interval in milliseconds.
    pub jwks_refresh_interval_ms: u64,

    /// Redis connection URL for the token blacklist.
    pub redis_url: String,

    /// HTTP server bind address.
    pub bind_address: String,

    /// Expected token issuer.
    pub expected_issuer: String,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("identity_service_url", &self.identity_service_url)
            .field("jwks_endpoint", &self.jwks_endpoint)
            .field("jwks_refresh_interval_ms", &self.jwks_refresh_interval_ms)
            .field("redis_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("expected_issuer", &self.expected_issuer)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWKS refresh interval configuration: {0}")]
    InvalidRefreshInterval(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let redis_url = vars
            .get("REDIS_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("REDIS_URL".to_string()))?
            .clone();

        let identity_service_url = vars
            .get("IDENTITY_SERVICE_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_IDENTITY_SERVICE_URL.to_string());

        let jwks_endpoint = vars
            .get("JWKS_ENDPOINT")
            .cloned()
            .unwrap_or_else(|| DEFAULT_JWKS_ENDPOINT.to_string());

        // Parse refresh interval with validation
        let jwks_refresh_interval_ms =
            if let Some(value_str) = vars.get("JWKS_REFRESH_INTERVAL_MS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidRefreshInterval(format!(
                        "JWKS_REFRESH_INTERVAL_MS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidRefreshInterval(
                        "JWKS_REFRESH_INTERVAL_MS must be greater than 0".to_string(),
                    ));
                }

                value
            } else {
                DEFAULT_JWKS_REFRESH_INTERVAL_MS
            };

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let expected_issuer = vars
            .get("EXPECTED_ISSUER")
            .cloned()
            .unwrap_or_else(|| DEFAULT_EXPECTED_ISSUER.to_string());

        Ok(Config {
            identity_service_url,
            jwks_endpoint,
            jwks_refresh_interval_ms,
            redis_url,
            bind_address,
            expected_issuer,
        })
    }

    /// Full URL of the JWKS endpoint.
    pub fn jwks_url(&self) -> String {
        format!(
            "{}{}",
            self.identity_service_url.trim_end_matches('/'),
            self.jwks_endpoint
        )
    }
}
