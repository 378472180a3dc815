//! Error types for token acquisition, caching, and refresh.

use thiserror::Error;

/// Failure reported by the authorization service's token endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthServiceError {
    /// Credentials rejected (400, 401).
    #[error("Credentials rejected with status {0}")]
    Rejected(u16),

    /// Auth service returned a 5xx.
    #[error("Auth service server error: status {0}")]
    ServerError(u16),

    /// Any other non-success status.
    #[error("Unexpected status: {0}")]
    UnexpectedStatus(u16),

    /// Connection, timeout, or other transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body could not be parsed or lacked a usable token.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

/// Errors that can occur during token management.
#[derive(Error, Debug, Clone)]
pub enum TokenError {
    /// The token endpoint failed or returned an unusable response.
    #[error("Auth service error: {0}")]
    AuthService(#[from] AuthServiceError),

    /// The token store could not persist a freshly acquired token.
    #[error("Token store write failed: {0}")]
    StoreWrite(String),

    /// Configuration error (e.g. the HTTP client could not be built).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The manager was shut down before the operation completed.
    #[error("Token manager has been shut down")]
    Shutdown,
}

impl TokenError {
    /// Whether a later attempt may succeed without operator intervention.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, TokenError::AuthService(_) | TokenError::StoreWrite(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_display() {
        let err = TokenError::AuthService(AuthServiceError::Rejected(401));
        assert!(err.to_string().contains("401"));

        let err = TokenError::AuthService(AuthServiceError::Transport(
            "connection refused".to_string(),
        ));
        assert!(err.to_string().contains("connection refused"));

        let err = TokenError::StoreWrite("capacity exceeded".to_string());
        assert!(err.to_string().contains("capacity exceeded"));

        let err = TokenError::Configuration("bad config".to_string());
        assert!(err.to_string().contains("bad config"));

        assert!(TokenError::Shutdown.to_string().contains("shut down"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(TokenError::AuthService(AuthServiceError::ServerError(503)).is_retryable());
        assert!(TokenError::StoreWrite("full".to_string()).is_retryable());
        assert!(!TokenError::Configuration("x".to_string()).is_retryable());
        assert!(!TokenError::Shutdown.is_retryable());
    }

    #[test]
    fn test_from_auth_service_error() {
        let err: TokenError = AuthServiceError::InvalidResponse("empty token".to_string()).into();
        assert!(matches!(
            err,
            TokenError::AuthService(AuthServiceError::InvalidResponse(_))
        ));
    }
}
