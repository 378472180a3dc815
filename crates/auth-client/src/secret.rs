//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for the client secret and for access
//! tokens. `SecretString` implements `Debug` with redaction, so any struct
//! deriving `Debug` that holds one is safe to log with `{:?}` or through
//! tracing fields.
//!
//! # Example
//!
//! ```rust
//! use auth_client::secret::{ExposeSecret, SecretString};
//!
//! let secret = SecretString::from("client-secret");
//! assert!(!format!("{secret:?}").contains("client-secret"));
//! assert_eq!(secret.expose_secret(), "client-secret");
//! ```
//!
//! Use `SecretString` for:
//! - OAuth client secrets
//! - Bearer access tokens
//! - Forwarded `Authorization` header values

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("hunter2");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_deserialized_credentials_are_redacted() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct RawCredentials {
            client_id: String,
            client_secret: SecretString,
        }

        let json = r#"{"client_id": "billing-svc", "client_secret": "s3cr3t-value"}"#;
        let creds: RawCredentials = serde_json::from_str(json).expect("deserialize");

        assert_eq!(creds.client_secret.expose_secret(), "s3cr3t-value");

        let debug = format!("{creds:?}");
        assert!(debug.contains("billing-svc"));
        assert!(!debug.contains("s3cr3t-value"));
    }
}
