//! Authorizer configuration.
//!
//! Configuration is loaded from environment variables.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default timeout for auth service requests.
pub const DEFAULT_AUTH_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Authorizer configuration.
#[derive(Debug, Clone)]
pub struct AuthorizerConfig {
    /// Base URL of the authorization service, without trailing slash.
    pub auth_domain: String,

    /// Timeout for each `/oauth2/authenticate` call (default: 10s).
    pub http_timeout: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: AUTH_DOMAIN")]
    MissingAuthDomain,

    #[error("Invalid auth HTTP timeout configuration: {0}")]
    InvalidHttpTimeout(String),
}

impl AuthorizerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`AuthorizerConfig::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingAuthDomain` if `AUTH_DOMAIN` is absent or blank
    /// - `ConfigError::InvalidHttpTimeout` if `AUTH_HTTP_TIMEOUT_SECONDS` is
    ///   not a positive integer
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth_domain = vars
            .get("AUTH_DOMAIN")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingAuthDomain)?;

        let http_timeout = if let Some(value_str) = vars.get("AUTH_HTTP_TIMEOUT_SECONDS") {
            let value: u64 = value_str.trim().parse().map_err(|e| {
                ConfigError::InvalidHttpTimeout(format!(
                    "AUTH_HTTP_TIMEOUT_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidHttpTimeout(
                    "AUTH_HTTP_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_AUTH_HTTP_TIMEOUT
        };

        Ok(Self {
            auth_domain,
            http_timeout,
        })
    }
}
