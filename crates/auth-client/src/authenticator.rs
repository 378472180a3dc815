//! OAuth 2.0 client-credentials exchange.
//!
//! [`HttpTokenAuthenticator`] performs exactly one `POST {auth_domain}/oauth2/token`
//! per call and turns the response into a [`TokenDescriptor`]. It never
//! retries; scheduling retries is the token manager's job.
//!
//! # Security
//!
//! - The client secret is only exposed while building the form body
//! - Error response bodies are logged at trace level only
//! - HTTP timeouts prevent hanging connections

use crate::config::{trim_base_url, ClientCredentials};
use crate::error::{AuthServiceError, TokenError};
use crate::secret::{ExposeSecret, SecretString};
use crate::token::{TokenDescriptor, DEFAULT_TOKEN_TYPE};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, instrument, trace, warn};

/// Path of the token endpoint under the auth domain.
pub const TOKEN_PATH: &str = "/oauth2/token";

/// Default connection timeout for the HTTP client.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Exchanges client credentials for a bearer token.
#[async_trait::async_trait]
pub trait TokenAuthenticator: Send + Sync {
    /// Perform one client-credentials grant.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::AuthService` when the endpoint is unreachable,
    /// answers with a non-success status, or returns no usable token.
    async fn authenticate(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<TokenDescriptor, TokenError>;
}

// =============================================================================
// OAuth Response Types
// =============================================================================

/// OAuth 2.0 token response.
#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(deserialize_with = "deserialize_expires_in")]
    expires_in: u64,
    #[serde(default)]
    scope: Option<String>,
}

impl std::fmt::Debug for OAuthTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// `expires_in` is a lifetime in seconds. Some servers send it as a string.
fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// HTTP Authenticator
// =============================================================================

/// Authenticator that talks to the auth service over HTTP.
#[derive(Clone)]
pub struct HttpTokenAuthenticator {
    http_client: reqwest::Client,
    token_url: String,
}

impl std::fmt::Debug for HttpTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTokenAuthenticator")
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl HttpTokenAuthenticator {
    /// Create an authenticator for `auth_domain`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the HTTP client cannot be built.
    pub fn new(auth_domain: &str, http_timeout: Duration) -> Result<Self, TokenError> {
        let http_client = reqwest::Client::builder()
            .timeout(http_timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TokenError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            token_url: format!("{}{TOKEN_PATH}", trim_base_url(auth_domain)),
        })
    }

    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

#[async_trait::async_trait]
impl TokenAuthenticator for HttpTokenAuthenticator {
    #[instrument(skip_all, fields(client_id = %credentials.client_id()))]
    async fn authenticate(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<TokenDescriptor, TokenError> {
        debug!(
            target: "auth_client.authenticator",
            url = %self.token_url,
            "Requesting token from auth service"
        );

        let scope = credentials.scope_string();
        let form_body = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id()),
            ("client_secret", credentials.client_secret().expose_secret()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&form_body)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "auth_client.authenticator", error = %e, "HTTP request failed");
                AuthServiceError::Transport(e.to_string())
            })?;

        let status = response.status();

        if status.is_success() {
            let issued_at = chrono::Utc::now();
            let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
                warn!(target: "auth_client.authenticator", error = %e, "Failed to parse token response");
                AuthServiceError::InvalidResponse(e.to_string())
            })?;

            if token_response.access_token.trim().is_empty() {
                warn!(target: "auth_client.authenticator", "Token response carried an empty access_token");
                return Err(
                    AuthServiceError::InvalidResponse("access_token is empty".to_string()).into(),
                );
            }

            debug!(
                target: "auth_client.authenticator",
                expires_in_secs = token_response.expires_in,
                "Token acquired successfully"
            );

            let token_type = token_response
                .token_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());

            Ok(TokenDescriptor::from_lifetime(
                SecretString::from(token_response.access_token),
                token_type,
                issued_at,
                token_response.expires_in,
            ))
        } else if status.as_u16() == 401 || status.as_u16() == 400 {
            let body = response.text().await.unwrap_or_else(|e| {
                trace!(target: "auth_client.authenticator", error = %e, "Failed to read error response body");
                "<failed to read body>".to_string()
            });
            warn!(
                target: "auth_client.authenticator",
                status = %status,
                "Credentials rejected by auth service"
            );
            trace!(
                target: "auth_client.authenticator",
                body = %body,
                "Rejection response body"
            );
            Err(AuthServiceError::Rejected(status.as_u16()).into())
        } else if status.is_server_error() {
            warn!(
                target: "auth_client.authenticator",
                status = %status,
                "Auth service returned server error"
            );
            Err(AuthServiceError::ServerError(status.as_u16()).into())
        } else {
            warn!(
                target: "auth_client.authenticator",
                status = %status,
                "Unexpected response from auth service"
            );
            Err(AuthServiceError::UnexpectedStatus(status.as_u16()).into())
        }
    }
}

/// Mock authenticator module for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted outcome of one mock authentication.
    #[derive(Debug, Clone)]
    pub enum MockOutcome {
        /// Issue `token-<n>` with the given lifetime in seconds.
        Issue(u64),
        /// Fail with the given error.
        Fail(AuthServiceError),
    }

    /// Mock authenticator that plays back outcomes in order.
    ///
    /// Once the script is exhausted the last outcome repeats.
    #[derive(Debug)]
    pub struct MockAuthenticator {
        outcomes: Vec<MockOutcome>,
        call_count: AtomicUsize,
        delay: Option<Duration>,
        seen_client_ids: Mutex<Vec<String>>,
    }

    impl MockAuthenticator {
        /// Always issue tokens with the given lifetime.
        #[must_use]
        pub fn issuing(lifetime_secs: u64) -> Self {
            Self::with_outcomes(vec![MockOutcome::Issue(lifetime_secs)])
        }

        /// Always fail with a 503.
        #[must_use]
        pub fn failing() -> Self {
            Self::with_outcomes(vec![MockOutcome::Fail(AuthServiceError::ServerError(503))])
        }

        /// Play back `outcomes` in sequence.
        #[must_use]
        pub fn with_outcomes(outcomes: Vec<MockOutcome>) -> Self {
            Self {
                outcomes,
                call_count: AtomicUsize::new(0),
                delay: None,
                seen_client_ids: Mutex::new(Vec::new()),
            }
        }

        /// Sleep this long before answering each call.
        #[must_use]
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Number of calls made.
        #[must_use]
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Client ids presented so far.
        #[must_use]
        pub fn seen_client_ids(&self) -> Vec<String> {
            self.seen_client_ids
                .lock()
                .map(|ids| ids.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl TokenAuthenticator for MockAuthenticator {
        async fn authenticate(
            &self,
            credentials: &ClientCredentials,
        ) -> Result<TokenDescriptor, TokenError> {
            let count = self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut ids) = self.seen_client_ids.lock() {
                ids.push(credentials.client_id().to_string());
            }

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let outcome = self
                .outcomes
                .get(count)
                .or_else(|| self.outcomes.last())
                .cloned()
                .unwrap_or(MockOutcome::Issue(3600));

            match outcome {
                MockOutcome::Issue(lifetime) => Ok(TokenDescriptor::from_lifetime(
                    SecretString::from(format!("token-{count}")),
                    DEFAULT_TOKEN_TYPE,
                    chrono::Utc::now(),
                    lifetime,
                )),
                MockOutcome::Fail(err) => Err(err.into()),
            }
        }
    }
}
