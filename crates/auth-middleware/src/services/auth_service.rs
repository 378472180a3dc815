//! Authorization service client.
//!
//! Forwards an inbound request's credentials to
//! `POST {auth_domain}/oauth2/authenticate` and classifies the answer.
//!
//! # Security
//!
//! - The forwarded `Authorization` value is held as a `SecretString`
//! - Response bodies from rejected calls are never echoed beyond their
//!   `message` field
//! - Transport failures surface as `AuthError::Internal` with a generic
//!   client-facing message

use crate::config::AuthorizerConfig;
use crate::errors::AuthError;
use crate::models::AuthenticateResponse;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Path of the token validation endpoint.
pub const AUTHENTICATE_PATH: &str = "/oauth2/authenticate";

/// Header carrying the scopes the route requires.
pub const SCOPES_HEADER: &str = "x-auth-scopes";

/// Header carrying the caller's organization, when present.
pub const ORGANIZATION_HEADER: &str = "x-auth-organization";

/// Message returned when the auth service rejects without saying why.
const DEFAULT_REJECTION_MESSAGE: &str = "invalid or expired authorization token";

/// Connect timeout for auth service requests.
const AUTH_CONNECT_TIMEOUT_SECS: u64 = 5;

/// One validation request.
pub struct AuthenticateRequest {
    /// The inbound `Authorization` header value, forwarded verbatim.
    pub authorization: SecretString,

    /// Scopes required by the route.
    pub scopes: Vec<String>,

    /// Inbound `x-auth-organization` value, if any.
    pub organization: Option<String>,
}

impl fmt::Debug for AuthenticateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticateRequest")
            .field("authorization", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("organization", &self.organization)
            .finish()
    }
}

impl AuthenticateRequest {
    /// Value sent in the scopes header.
    pub fn scope_header(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Seam for the auth service so the middleware can be tested without HTTP.
#[async_trait]
pub trait AuthServiceClient: Send + Sync {
    /// Validate the forwarded credentials.
    ///
    /// # Errors
    ///
    /// - `AuthError::Unauthorized` if the credentials were rejected or the
    ///   answer could not be understood
    /// - `AuthError::Internal` if the auth service could not be reached
    async fn authenticate(
        &self,
        request: &AuthenticateRequest,
    ) -> Result<AuthenticateResponse, AuthError>;
}

/// Structured error body, when the auth service sends one.
#[derive(Deserialize)]
struct RejectionBody {
    message: String,
}

/// HTTP implementation of [`AuthServiceClient`].
#[derive(Clone)]
pub struct HttpAuthServiceClient {
    client: Client,
    authenticate_url: String,
}

impl fmt::Debug for HttpAuthServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAuthServiceClient")
            .field("authenticate_url", &self.authenticate_url)
            .finish_non_exhaustive()
    }
}

impl HttpAuthServiceClient {
    /// Create a client for the auth service at `auth_domain`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the HTTP client cannot be built.
    pub fn new(auth_domain: &str, http_timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(http_timeout)
            .connect_timeout(Duration::from_secs(AUTH_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            authenticate_url: format!(
                "{}{}",
                auth_domain.trim().trim_end_matches('/'),
                AUTHENTICATE_PATH
            ),
        })
    }

    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the HTTP client cannot be built.
    pub fn from_config(config: &AuthorizerConfig) -> Result<Self, AuthError> {
        Self::new(&config.auth_domain, config.http_timeout)
    }

    pub fn authenticate_url(&self) -> &str {
        &self.authenticate_url
    }
}

#[async_trait]
impl AuthServiceClient for HttpAuthServiceClient {
    #[instrument(skip_all, fields(scopes = %request.scope_header()))]
    async fn authenticate(
        &self,
        request: &AuthenticateRequest,
    ) -> Result<AuthenticateResponse, AuthError> {
        let mut builder = self
            .client
            .post(&self.authenticate_url)
            .header("Authorization", request.authorization.expose_secret())
            .header(SCOPES_HEADER, request.scope_header());

        if let Some(organization) = &request.organization {
            builder = builder.header(ORGANIZATION_HEADER, organization);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(target: "auth_middleware.auth_service", error = %e, "Auth service request failed");
            AuthError::Internal(format!("Auth service request failed: {e}"))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!(target: "auth_middleware.auth_service", error = %e, "Failed to read auth service response");
            AuthError::Internal(format!("Failed to read auth service response: {e}"))
        })?;

        if status.is_success() {
            if body.trim().is_empty() {
                debug!(target: "auth_middleware.auth_service", "Auth service returned an empty body");
                return Err(AuthError::unauthorized(DEFAULT_REJECTION_MESSAGE));
            }

            return serde_json::from_str::<AuthenticateResponse>(&body).map_err(|e| {
                warn!(target: "auth_middleware.auth_service", error = %e, "Failed to parse auth service response");
                AuthError::unauthorized(DEFAULT_REJECTION_MESSAGE)
            });
        }

        let message = serde_json::from_str::<RejectionBody>(&body)
            .map(|b| b.message)
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REJECTION_MESSAGE.to_string());

        if status.is_server_error() {
            warn!(target: "auth_middleware.auth_service", status = %status, "Auth service returned server error");
        } else {
            debug!(target: "auth_middleware.auth_service", status = %status, "Auth service rejected credentials");
        }

        Err(AuthError::unauthorized_with_status(message, status.as_u16()))
    }
}

/// Mock auth service client for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock client returning a fixed outcome.
    pub struct MockAuthServiceClient {
        outcome: Result<AuthenticateResponse, AuthError>,
        call_count: AtomicUsize,
        last_scopes: Mutex<Option<Vec<String>>>,
        last_organization: Mutex<Option<String>>,
    }

    impl MockAuthServiceClient {
        /// Accept every request, granting `scope` (space-separated).
        pub fn granting(scope: &str, role: Option<&str>, user: Option<&str>) -> Self {
            Self::with_outcome(Ok(AuthenticateResponse {
                scope: scope.to_string(),
                role: role.map(str::to_string),
                user: user.map(str::to_string),
            }))
        }

        /// Reject every request with `status`.
        pub fn rejecting(status: u16) -> Self {
            Self::with_outcome(Err(AuthError::unauthorized_with_status(
                DEFAULT_REJECTION_MESSAGE,
                status,
            )))
        }

        /// Fail every request as if the auth service were unreachable.
        pub fn unreachable() -> Self {
            Self::with_outcome(Err(AuthError::Internal("connection refused".to_string())))
        }

        pub fn with_outcome(outcome: Result<AuthenticateResponse, AuthError>) -> Self {
            Self {
                outcome,
                call_count: AtomicUsize::new(0),
                last_scopes: Mutex::new(None),
                last_organization: Mutex::new(None),
            }
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Scopes sent on the most recent call.
        pub fn last_scopes(&self) -> Option<Vec<String>> {
            self.last_scopes.lock().ok().and_then(|s| s.clone())
        }

        /// Organization sent on the most recent call.
        pub fn last_organization(&self) -> Option<String> {
            self.last_organization.lock().ok().and_then(|o| o.clone())
        }
    }

    #[async_trait]
    impl AuthServiceClient for MockAuthServiceClient {
        async fn authenticate(
            &self,
            request: &AuthenticateRequest,
        ) -> Result<AuthenticateResponse, AuthError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut scopes) = self.last_scopes.lock() {
                *scopes = Some(request.scopes.clone());
            }
            if let Ok(mut organization) = self.last_organization.lock() {
                organization.clone_from(&request.organization);
            }
            self.outcome.clone()
        }
    }
}
