//! Authorization error types.
//!
//! Every error maps to a JSON body `{message, status, code}` via the
//! `IntoResponse` impl. Internal failures return a generic message; the
//! actual cause is logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message used when the request carries no credentials at all.
pub const MISSING_TOKEN_MESSAGE: &str = "no authorization token was found";

/// Message returned to clients for internal failures.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Authorization error type.
///
/// Maps to HTTP status codes:
/// - Unauthorized: 401, or 403 when the auth service answered 403
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { message: String, status: u16 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// 401 with the given message.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            status: 401,
        }
    }

    /// Unauthorized with the auth service's status when it is 401 or 403,
    /// otherwise 401.
    pub fn unauthorized_with_status(message: impl Into<String>, status: u16) -> Self {
        let status = if status == 403 { 403 } else { 401 };
        Self::Unauthorized {
            message: message.into(),
            status,
        }
    }

    /// The request carried no usable `Authorization` header.
    pub fn missing_token() -> Self {
        Self::unauthorized(MISSING_TOKEN_MESSAGE)
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Unauthorized { status, .. } => *status,
            AuthError::Internal(_) => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    status: u16,
    code: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // No credentials at all gets a bare challenge, without an error code.
        let challenge = if self == AuthError::missing_token() {
            "Bearer"
        } else {
            "Bearer error=\"invalid_token\""
        };

        let (status, code, message) = match self {
            AuthError::Unauthorized { message, status } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::UNAUTHORIZED),
                "unauthorized",
                message,
            ),
            AuthError::Internal(detail) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "auth_middleware.authorize", error = %detail, "Authorization failed internally");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        };

        let body = ErrorBody {
            message,
            status: status.as_u16(),
            code,
        };

        let mut response = (status, Json(body)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = challenge.parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
