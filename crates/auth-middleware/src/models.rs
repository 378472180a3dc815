//! Auth service payloads and the authorized request context.

use crate::errors::AuthError;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Success body of `POST /oauth2/authenticate`.
///
/// `scope` is required: a success body without it is not a grant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthenticateResponse {
    /// Granted scopes, space-separated.
    pub scope: String,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub user: Option<String>,
}

/// Identity resolved for an authorized request.
///
/// Inserted into request extensions by the `authorize` middleware.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthorizedContext {
    pub scopes: BTreeSet<String>,
    pub role: Option<String>,
    pub user: Option<String>,
}

impl AuthorizedContext {
    /// Whether `scope` was granted.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Required scopes that were not granted, in the order given.
    pub fn missing_scopes<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .map(String::as_str)
            .filter(|scope| !self.has_scope(scope))
            .collect()
    }
}

impl From<AuthenticateResponse> for AuthorizedContext {
    fn from(response: AuthenticateResponse) -> Self {
        Self {
            scopes: response
                .scope
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            role: response.role.filter(|r| !r.is_empty()),
            user: response.user.filter(|u| !u.is_empty()),
        }
    }
}

/// Handlers behind the `authorize` layer can take `AuthorizedContext`
/// directly as an argument.
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthorizedContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthorizedContext>()
            .cloned()
            .ok_or_else(|| {
                AuthError::Internal("AuthorizedContext requested on a route without the authorize layer".to_string())
            })
    }
}
