//! Client SDK for services that authenticate with OAuth 2.0 client credentials.
//!
//! The central piece is [`token_manager::TokenLifecycleManager`], which
//! acquires a bearer token, caches it in a [`token_store::TokenStore`], and
//! refreshes it in the background before it expires. Resource calls made
//! through [`resources::ResourceClient`] read the cached token and never
//! authenticate on their own.

#![warn(clippy::pedantic)]

/// Module for configuration loading and client credentials
pub mod config;

/// Module for token lifecycle error types
pub mod error;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for the bearer token descriptor
pub mod token;

/// Module for the single-slot token cache
pub mod token_store;

/// Module for the client-credentials exchange
pub mod authenticator;

/// Module for background token acquisition and refresh
pub mod token_manager;

/// Module for authenticated CRUD access to remote resources
pub mod resources;

pub use config::{ClientConfig, ClientCredentials, ConfigError};
pub use error::{AuthServiceError, TokenError};
pub use token::TokenDescriptor;
pub use resources::{Resource, ResourceClient, ResourceError};
pub use token_manager::{
    ManagerState, PendingRefresh, RefreshKind, TokenLifecycleManager, TokenManagerConfig,
};
pub use token_store::{InMemoryTokenStore, TokenStore};
