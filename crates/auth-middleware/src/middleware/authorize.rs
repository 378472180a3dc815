//! Authorization middleware for protected routes.
//!
//! Reads the `Authorization` header, asks the auth service whether it grants
//! the route's required scopes, and injects the resolved
//! [`AuthorizedContext`] into request extensions.
//!
//! The organization forwarded to the auth service comes from the
//! `x-auth-organization` header, or else from an `:organization` route
//! parameter.

use crate::config::AuthorizerConfig;
use crate::errors::AuthError;
use crate::models::AuthorizedContext;
use crate::services::auth_service::ORGANIZATION_HEADER;
use crate::services::{AuthServiceClient, AuthenticateRequest, HttpAuthServiceClient};
use axum::{
    extract::{RawPathParams, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::IntoResponse,
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Route parameter naming the organization a request is scoped to.
pub const ORGANIZATION_PATH_PARAM: &str = "organization";

/// Validates inbound credentials against the auth service.
#[derive(Clone)]
pub struct RequestAuthorizer {
    client: Arc<dyn AuthServiceClient>,
}

impl RequestAuthorizer {
    pub fn new(client: Arc<dyn AuthServiceClient>) -> Self {
        Self { client }
    }

    /// Authorize a request by its headers.
    ///
    /// # Errors
    ///
    /// - `AuthError::Unauthorized` if the header is missing, the auth
    ///   service rejects it, or a required scope was not granted (403)
    /// - `AuthError::Internal` if the auth service is unreachable
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        required_scopes: &[String],
    ) -> Result<AuthorizedContext, AuthError> {
        self.authorize_in(headers, required_scopes, None).await
    }

    /// Like [`authorize`](Self::authorize), with the organization taken from
    /// the route when the request has no `x-auth-organization` header.
    ///
    /// # Errors
    ///
    /// Same as [`authorize`](Self::authorize).
    pub async fn authorize_in(
        &self,
        headers: &HeaderMap,
        required_scopes: &[String],
        route_organization: Option<&str>,
    ) -> Result<AuthorizedContext, AuthError> {
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                debug!(target: "auth_middleware.authorize", "Missing Authorization header");
                AuthError::missing_token()
            })?;

        let organization = headers
            .get(ORGANIZATION_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .or_else(|| route_organization.map(str::trim).filter(|o| !o.is_empty()))
            .map(str::to_string);

        let request = AuthenticateRequest {
            authorization: SecretString::from(authorization.to_string()),
            scopes: required_scopes.to_vec(),
            organization,
        };

        let response = self.client.authenticate(&request).await?;
        let context = AuthorizedContext::from(response);

        let missing = context.missing_scopes(required_scopes);
        if !missing.is_empty() {
            debug!(
                target: "auth_middleware.authorize",
                missing = %missing.join(" "),
                "Granted scopes do not cover the route"
            );
            return Err(AuthError::unauthorized_with_status(
                format!("insufficient scope: {}", missing.join(" ")),
                403,
            ));
        }

        debug!(
            target: "auth_middleware.authorize",
            user = ?context.user,
            role = ?context.role,
            "Request authorized"
        );

        Ok(context)
    }
}

/// State for the authorization middleware.
///
/// One state per route layer: the required scopes are fixed per layer.
#[derive(Clone)]
pub struct AuthorizerState {
    pub authorizer: RequestAuthorizer,
    pub required_scopes: Vec<String>,
}

impl AuthorizerState {
    /// State with no required scopes.
    pub fn new(client: Arc<dyn AuthServiceClient>) -> Self {
        Self {
            authorizer: RequestAuthorizer::new(client),
            required_scopes: Vec::new(),
        }
    }

    /// State backed by the HTTP auth service client.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the HTTP client cannot be built.
    pub fn from_config(config: &AuthorizerConfig) -> Result<Self, AuthError> {
        Ok(Self::new(Arc::new(HttpAuthServiceClient::from_config(config)?)))
    }

    /// Require these scopes on every request through this layer.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

/// Authorization middleware.
///
/// # Response
///
/// - Returns 401 when unauthorized, 403 when the auth service says so or a
///   required scope was not granted
/// - Returns 500 when the auth service cannot be reached
/// - Continues to next handler with `AuthorizedContext` in extensions otherwise
#[instrument(skip_all, name = "auth_middleware.authorize")]
pub async fn authorize(
    State(state): State<Arc<AuthorizerState>>,
    params: Option<RawPathParams>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let route_organization = params.as_ref().and_then(|params| {
        params
            .iter()
            .find(|(name, _)| *name == ORGANIZATION_PATH_PARAM)
            .map(|(_, value)| value)
    });

    let context = state
        .authorizer
        .authorize_in(req.headers(), &state.required_scopes, route_organization)
        .await?;

    // Store context in request extensions for downstream handlers
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

/// Extension trait for reading the authorized context from a request.
pub trait AuthorizedContextExt {
    /// Returns `None` if the authorize middleware was not applied.
    fn authorized_context(&self) -> Option<&AuthorizedContext>;
}

impl<B> AuthorizedContextExt for axum::extract::Request<B> {
    fn authorized_context(&self) -> Option<&AuthorizedContext> {
        self.extensions().get::<AuthorizedContext>()
    }
}
