//! Builders for auth service response bodies

use serde_json::{json, Value};

/// Body of a successful `POST /oauth2/token`.
pub fn token_response(access_token: &str, expires_in: u64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in,
    })
}

/// Builder for the `POST /oauth2/authenticate` success body.
///
/// # Example
/// ```rust,ignore
/// let body = AuthenticateResponseBuilder::new()
///     .with_scope("orders:read orders:write")
///     .with_role("admin")
///     .for_user("user-alice")
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct AuthenticateResponseBuilder {
    scope: String,
    role: Option<String>,
    user: Option<String>,
}

impl AuthenticateResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the granted scopes (space-separated)
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    pub fn for_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    /// Build the body; absent role and user are omitted.
    pub fn build(self) -> Value {
        let mut body = json!({ "scope": self.scope });
        if let Some(role) = self.role {
            body["role"] = json!(role);
        }
        if let Some(user) = self.user {
            body["user"] = json!(user);
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_shape() {
        let body = token_response("abc", 60);
        assert_eq!(body["access_token"], "abc");
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], 60);
    }

    #[test]
    fn test_authenticate_builder_omits_absent_fields() {
        let body = AuthenticateResponseBuilder::new()
            .with_scope("orders:read")
            .build();

        assert_eq!(body["scope"], "orders:read");
        assert!(body.get("role").is_none());
        assert!(body.get("user").is_none());
    }

    #[test]
    fn test_authenticate_builder_full() {
        let body = AuthenticateResponseBuilder::new()
            .with_scope("a b")
            .with_role("admin")
            .for_user("alice")
            .build();

        assert_eq!(body["role"], "admin");
        assert_eq!(body["user"], "alice");
    }
}
