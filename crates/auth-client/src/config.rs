//! SDK configuration.
//!
//! Configuration is loaded from environment variables. The client secret is
//! redacted in Debug output. Every required field that is absent fails
//! construction with its own error variant, before any network use.

use crate::secret::{ExposeSecret, SecretString};
use crate::token_manager::{
    TokenManagerConfig, DEFAULT_HTTP_TIMEOUT, DEFAULT_MIN_REFRESH_DELAY, DEFAULT_REFRESH_MARGIN,
    DEFAULT_RETRY_DELAY,
};
use std::collections::{BTreeSet, HashMap};
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: API_BASE_URL (base URL of the microservice API)")]
    MissingApiBaseUrl,

    #[error("Missing required configuration: AUTH_DOMAIN (base URL of the authorization service)")]
    MissingAuthDomain,

    #[error("Missing required credential: client id")]
    MissingClientId,

    #[error("Missing required credential: client secret")]
    MissingClientSecret,

    #[error("Missing required credential: at least one scope")]
    MissingScopes,

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

// =============================================================================
// Client Credentials
// =============================================================================

/// Identity used for the client-credentials grant.
///
/// Immutable once constructed. Scopes are kept sorted so the wire form is
/// deterministic.
#[derive(Clone)]
pub struct ClientCredentials {
    client_id: String,
    client_secret: SecretString,
    scopes: BTreeSet<String>,
}

impl ClientCredentials {
    /// Build credentials, rejecting blank fields.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingClientId` if `client_id` is blank
    /// - `ConfigError::MissingClientSecret` if `client_secret` is blank
    /// - `ConfigError::MissingScopes` if no non-blank scope is given
    pub fn new<I, S>(
        client_id: impl Into<String>,
        client_secret: SecretString,
        scopes: I,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client_id = client_id.into().trim().to_string();
        if client_id.is_empty() {
            return Err(ConfigError::MissingClientId);
        }

        if client_secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::MissingClientSecret);
        }

        let scopes: BTreeSet<String> = scopes
            .into_iter()
            .map(|s| s.into().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if scopes.is_empty() {
            return Err(ConfigError::MissingScopes);
        }

        Ok(Self {
            client_id,
            client_secret,
            scopes,
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    #[must_use]
    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    /// Scopes joined with single spaces, as sent in the `scope` form field.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .finish()
    }
}

// =============================================================================
// Client Config
// =============================================================================

/// Full SDK configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the microservice API (resource calls).
    pub api_base_url: String,

    /// Base URL of the authorization service (`/oauth2/token` lives under it).
    pub auth_domain: String,

    /// Client-credentials identity.
    pub credentials: ClientCredentials,

    /// Refresh this long before the token expires.
    pub refresh_margin: Duration,

    /// Delay before retrying a failed authentication or store write.
    pub retry_delay: Duration,

    /// Lower bound on any armed refresh timer.
    pub min_refresh_delay: Duration,

    /// HTTP request timeout for token and resource calls.
    pub http_timeout: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url)
            .field("auth_domain", &self.auth_domain)
            .field("credentials", &self.credentials)
            .field("refresh_margin", &self.refresh_margin)
            .field("retry_delay", &self.retry_delay)
            .field("min_refresh_delay", &self.min_refresh_delay)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns the `ConfigError` variant naming the first missing required
    /// field, or `ConfigError::InvalidValue` for an unparsable optional one.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let api_base_url =
            required(vars, "API_BASE_URL").ok_or(ConfigError::MissingApiBaseUrl)?;
        let auth_domain = required(vars, "AUTH_DOMAIN").ok_or(ConfigError::MissingAuthDomain)?;
        let client_id = required(vars, "CLIENT_ID").ok_or(ConfigError::MissingClientId)?;
        let client_secret =
            required(vars, "CLIENT_SECRET").ok_or(ConfigError::MissingClientSecret)?;
        let scopes = required(vars, "CLIENT_SCOPES").ok_or(ConfigError::MissingScopes)?;

        let credentials = ClientCredentials::new(
            client_id,
            SecretString::from(client_secret),
            scopes
                .split(|c: char| c.is_whitespace() || c == ',')
                .map(str::to_string),
        )?;

        let refresh_margin = parse_seconds(
            vars,
            "TOKEN_REFRESH_MARGIN_SECONDS",
            DEFAULT_REFRESH_MARGIN,
            true,
        )?;
        let retry_delay =
            parse_seconds(vars, "TOKEN_RETRY_DELAY_SECONDS", DEFAULT_RETRY_DELAY, false)?;
        let min_refresh_delay = parse_seconds(
            vars,
            "TOKEN_MIN_REFRESH_DELAY_SECONDS",
            DEFAULT_MIN_REFRESH_DELAY,
            false,
        )?;
        let http_timeout =
            parse_seconds(vars, "HTTP_TIMEOUT_SECONDS", DEFAULT_HTTP_TIMEOUT, false)?;

        Ok(ClientConfig {
            api_base_url: trim_base_url(&api_base_url),
            auth_domain: trim_base_url(&auth_domain),
            credentials,
            refresh_margin,
            retry_delay,
            min_refresh_delay,
            http_timeout,
        })
    }

    /// Timing settings for the token lifecycle manager.
    #[must_use]
    pub fn token_manager_config(&self) -> TokenManagerConfig {
        TokenManagerConfig {
            refresh_margin: self.refresh_margin,
            retry_delay: self.retry_delay,
            min_refresh_delay: self.min_refresh_delay,
        }
    }
}

/// Strip trailing slashes so paths can be appended with `format!("{base}/…")`.
#[must_use]
pub fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn required(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    key: &str,
    default: Duration,
    allow_zero: bool,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(key) else {
        return Ok(default);
    };

    let value: u64 = value_str.trim().parse().map_err(|e| {
        ConfigError::InvalidValue(format!(
            "{key} must be a non-negative integer, got '{value_str}': {e}"
        ))
    })?;

    if value == 0 && !allow_zero {
        return Err(ConfigError::InvalidValue(format!(
            "{key} must be greater than 0"
        )));
    }

    Ok(Duration::from_secs(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "API_BASE_URL".to_string(),
                "https://api.example.com/".to_string(),
            ),
            (
                "AUTH_DOMAIN".to_string(),
                "https://auth.example.com".to_string(),
            ),
            ("CLIENT_ID".to_string(), "billing-svc".to_string()),
            ("CLIENT_SECRET".to_string(), "top-secret".to_string()),
            (
                "CLIENT_SCOPES".to_string(),
                "customers:read orders:write".to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = ClientConfig::from_vars(&base_vars()).expect("Config should load");

        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.auth_domain, "https://auth.example.com");
        assert_eq!(config.credentials.client_id(), "billing-svc");
        assert_eq!(
            config.credentials.scope_string(),
            "customers:read orders:write"
        );
        assert_eq!(config.refresh_margin, DEFAULT_REFRESH_MARGIN);
        assert_eq!(config.retry_delay, DEFAULT_RETRY_DELAY);
        assert_eq!(config.min_refresh_delay, DEFAULT_MIN_REFRESH_DELAY);
        assert_eq!(config.http_timeout, DEFAULT_HTTP_TIMEOUT);
    }

    #[test]
    fn test_from_vars_custom_timings() {
        let mut vars = base_vars();
        vars.insert("TOKEN_REFRESH_MARGIN_SECONDS".to_string(), "0".to_string());
        vars.insert("TOKEN_RETRY_DELAY_SECONDS".to_string(), "120".to_string());
        vars.insert(
            "TOKEN_MIN_REFRESH_DELAY_SECONDS".to_string(),
            "2".to_string(),
        );
        vars.insert("HTTP_TIMEOUT_SECONDS".to_string(), "3".to_string());

        let config = ClientConfig::from_vars(&vars).expect("Config should load");
        assert_eq!(config.refresh_margin, Duration::ZERO);
        assert_eq!(config.retry_delay, Duration::from_secs(120));
        assert_eq!(config.min_refresh_delay, Duration::from_secs(2));
        assert_eq!(config.http_timeout, Duration::from_secs(3));

        let manager_config = config.token_manager_config();
        assert_eq!(manager_config.retry_delay, Duration::from_secs(120));
    }

    #[test]
    fn test_each_missing_field_has_distinct_error() {
        let cases = [
            ("API_BASE_URL", ConfigError::MissingApiBaseUrl),
            ("AUTH_DOMAIN", ConfigError::MissingAuthDomain),
            ("CLIENT_ID", ConfigError::MissingClientId),
            ("CLIENT_SECRET", ConfigError::MissingClientSecret),
            ("CLIENT_SCOPES", ConfigError::MissingScopes),
        ];

        for (key, expected) in cases {
            let mut vars = base_vars();
            vars.remove(key);
            let result = ClientConfig::from_vars(&vars);
            assert_eq!(result.unwrap_err(), expected, "removing {key}");
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut vars = base_vars();
        vars.insert("CLIENT_SECRET".to_string(), "   ".to_string());

        let result = ClientConfig::from_vars(&vars);
        assert_eq!(result.unwrap_err(), ConfigError::MissingClientSecret);
    }

    #[test]
    fn test_scopes_accept_commas() {
        let mut vars = base_vars();
        vars.insert(
            "CLIENT_SCOPES".to_string(),
            "products:read,invoices:read, ".to_string(),
        );

        let config = ClientConfig::from_vars(&vars).expect("Config should load");
        assert_eq!(config.credentials.scopes().len(), 2);
        assert_eq!(
            config.credentials.scope_string(),
            "invoices:read products:read"
        );
    }

    #[test]
    fn test_scopes_only_separators_is_missing() {
        let mut vars = base_vars();
        vars.insert("CLIENT_SCOPES".to_string(), " , ,".to_string());

        let result = ClientConfig::from_vars(&vars);
        assert_eq!(result.unwrap_err(), ConfigError::MissingScopes);
    }

    #[test]
    fn test_retry_delay_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("TOKEN_RETRY_DELAY_SECONDS".to_string(), "0".to_string());

        let result = ClientConfig::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("greater than 0"))
        );
    }

    #[test]
    fn test_timeout_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert("HTTP_TIMEOUT_SECONDS".to_string(), "ten".to_string());

        let result = ClientConfig::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("HTTP_TIMEOUT_SECONDS"))
        );
    }

    #[test]
    fn test_credentials_reject_blank_id() {
        let result = ClientCredentials::new("", SecretString::from("secret"), ["a"]);
        assert_eq!(result.unwrap_err(), ConfigError::MissingClientId);
    }

    #[test]
    fn test_credentials_reject_empty_scopes() {
        let result =
            ClientCredentials::new("client", SecretString::from("secret"), Vec::<String>::new());
        assert_eq!(result.unwrap_err(), ConfigError::MissingScopes);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = ClientConfig::from_vars(&base_vars()).expect("Config should load");

        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("top-secret"));
        assert!(debug_str.contains("billing-svc"));
    }
}
