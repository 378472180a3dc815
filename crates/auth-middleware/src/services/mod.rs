//! Clients for services the middleware depends on.

pub mod auth_service;

pub use auth_service::{AuthServiceClient, AuthenticateRequest, HttpAuthServiceClient};
