//! Fixed test identities for deterministic tests

use std::collections::HashMap;

// Client credentials
pub const TEST_CLIENT_ID: &str = "orders-service";
pub const TEST_CLIENT_SECRET: &str = "test-secret-do-not-use-in-production";

// Scopes
pub const SCOPE_ORDERS_READ: &str = "orders:read";
pub const SCOPE_ORDERS_WRITE: &str = "orders:write";
pub const SCOPE_CUSTOMERS_READ: &str = "customers:read";

// Inbound request identity
pub const TEST_BEARER_TOKEN: &str = "inbound-test-token";
pub const TEST_ORGANIZATION: &str = "org-acme";
pub const TEST_USER: &str = "user-alice";
pub const TEST_ROLE: &str = "admin";

// Issued tokens
pub const TEST_ACCESS_TOKEN: &str = "issued-access-token";
pub const TEST_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Environment map accepted by `ClientConfig::from_vars`, pointing both base
/// URLs at the given mock servers.
pub fn client_env(auth_domain: &str, api_base_url: &str) -> HashMap<String, String> {
    HashMap::from([
        ("API_BASE_URL".to_string(), api_base_url.to_string()),
        ("AUTH_DOMAIN".to_string(), auth_domain.to_string()),
        ("CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
        ("CLIENT_SECRET".to_string(), TEST_CLIENT_SECRET.to_string()),
        (
            "CLIENT_SCOPES".to_string(),
            format!("{SCOPE_ORDERS_READ} {SCOPE_CUSTOMERS_READ}"),
        ),
    ])
}
