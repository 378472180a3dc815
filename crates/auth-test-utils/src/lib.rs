//! # Auth Test Utilities
//!
//! Shared test utilities for the auth client and auth middleware crates.
//!
//! This crate provides:
//! - Fixed test credentials, scopes and identities
//! - Response builders for the auth service endpoints
//! - A wiremock-backed auth service (`MockAuthService`)
//! - Custom assertions for captured requests (`RequestAssertions`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let auth = MockAuthService::start().await;
//!     auth.mock_token_success("token-abc", 3600).await;
//!
//!     // ... point the client at auth.uri() ...
//!
//!     auth.token_requests().await[0]
//!         .assert_form_field("grant_type", "client_credentials")
//!         .assert_form_field("client_id", TEST_CLIENT_ID);
//! }
//! ```

pub mod assertions;
pub mod mock_auth_service;
pub mod response_builders;
pub mod test_ids;

// Re-export commonly used items
pub use assertions::*;
pub use mock_auth_service::*;
pub use response_builders::*;
pub use test_ids::*;
