//! Request authorization middleware.
//!
//! Validates the credentials on inbound requests by asking the authorization
//! service (`POST {AUTH_DOMAIN}/oauth2/authenticate`) and attaches the
//! resolved identity and scopes to the request for downstream handlers.
//!
//! # Modules
//!
//! - `config` - Authorizer configuration from environment
//! - `errors` - Error type with HTTP status code mapping
//! - `models` - Auth service payloads and the authorized request context
//! - `services` - Auth service client (HTTP and mock)
//! - `middleware` - Axum middleware function and state
//!
//! # Example
//!
//! ```rust,ignore
//! use auth_middleware::{authorize, AuthorizedContext, AuthorizerConfig, AuthorizerState};
//! use axum::{middleware::from_fn_with_state, routing::get, Router};
//! use std::sync::Arc;
//!
//! let config = AuthorizerConfig::from_env()?;
//! let state = Arc::new(AuthorizerState::from_config(&config)?.with_scopes(["orders:read"]));
//!
//! let app: Router = Router::new()
//!     .route("/orders", get(|ctx: AuthorizedContext| async move { format!("{:?}", ctx.user) }))
//!     .layer(from_fn_with_state(state, authorize));
//! ```

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::{AuthorizerConfig, ConfigError};
pub use errors::AuthError;
pub use middleware::authorize::{
    authorize, AuthorizedContextExt, AuthorizerState, RequestAuthorizer, ORGANIZATION_PATH_PARAM,
};
pub use models::AuthorizedContext;
