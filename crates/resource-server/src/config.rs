//! Resource server configuration.
//!
//! Process settings come from environment variables. The authentication
//! policy lives in a JSON service document named by `AUTH_CONFIG_PATH`:
//!
//! ```json
//! { "authentication": { "@OpenID": { "issuer": "...", "audience": "...", "verification": { ... } } } }
//! ```

use bearer_auth::{AuthenticationConfig, AuthenticationProvider};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Upper bound for `REQUEST_TIMEOUT_SECONDS` and `DRAIN_SECONDS`.
pub const MAX_DURATION_SECONDS: u64 = 300;

/// Resource server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the JSON service document.
    pub auth_config_path: PathBuf,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout (default: 30s).
    pub request_timeout: Duration,

    /// How long to keep serving in-flight requests after a shutdown signal
    /// (default: 0s).
    pub drain_period: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid request timeout configuration: {0}")]
    InvalidRequestTimeout(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainPeriod(String),

    #[error(transparent)]
    Authentication(#[from] bearer_auth::ConfigError),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `AUTH_CONFIG_PATH` is missing or a numeric
    /// setting is malformed or out of range.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth_config_path = vars
            .get("AUTH_CONFIG_PATH")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("AUTH_CONFIG_PATH".to_string()))?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let request_timeout = if let Some(value_str) = vars.get("REQUEST_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidRequestTimeout(format!(
                    "REQUEST_TIMEOUT_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 || value > MAX_DURATION_SECONDS {
                return Err(ConfigError::InvalidRequestTimeout(format!(
                    "REQUEST_TIMEOUT_SECONDS must be between 1 and {MAX_DURATION_SECONDS}, got {value}"
                )));
            }

            value
        } else {
            DEFAULT_REQUEST_TIMEOUT_SECONDS
        };

        let drain_seconds = if let Some(value_str) = vars.get("DRAIN_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainPeriod(format!(
                    "DRAIN_SECONDS must be a valid non-negative integer, got '{value_str}': {e}"
                ))
            })?;

            if value > MAX_DURATION_SECONDS {
                return Err(ConfigError::InvalidDrainPeriod(format!(
                    "DRAIN_SECONDS must not exceed {MAX_DURATION_SECONDS} seconds, got {value}"
                )));
            }

            value
        } else {
            0
        };

        Ok(Self {
            auth_config_path,
            bind_address,
            request_timeout: Duration::from_secs(request_timeout),
            drain_period: Duration::from_secs(drain_seconds),
        })
    }
}

// =============================================================================
// Service document
// =============================================================================

/// The JSON service document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDocument {
    authentication: AuthenticationProvider,
}

impl ServiceDocument {
    /// Parse a service document.
    ///
    /// # Errors
    ///
    /// Returns the located parse or validation error.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json)
            .map_err(|e| ConfigError::Authentication(bearer_auth::ConfigError::Invalid(e)))
    }

    /// Read and parse the service document at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| {
            tracing::error!(
                target: "resource_server.config",
                path = %path.display(),
                error = %source,
                "Failed to read service document"
            );
            bearer_auth::ConfigError::Read {
                kind: "service document",
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_json_str(&json)
    }

    /// The authentication policy of the protected resource.
    #[must_use]
    pub fn authentication(&self) -> &AuthenticationConfig {
        self.authentication.config()
    }

    #[must_use]
    pub fn into_authentication(self) -> AuthenticationConfig {
        self.authentication.into_config()
    }
}
