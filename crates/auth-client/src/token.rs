//! Bearer token descriptor.

use crate::secret::{ExposeSecret, SecretString};
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Token type used when the auth service omits or lowercases it.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// An access token together with its absolute expiry.
///
/// `expires_at` is always computed as issuance time plus the granted lifetime.
/// The access token is redacted in Debug output.
#[derive(Clone, Debug)]
pub struct TokenDescriptor {
    access_token: SecretString,
    token_type: String,
    expires_at: DateTime<Utc>,
}

impl TokenDescriptor {
    /// Create a descriptor with an explicit expiry.
    #[must_use]
    pub fn new(
        access_token: SecretString,
        token_type: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            token_type: token_type.into(),
            expires_at,
        }
    }

    /// Create a descriptor issued at `issued_at` and valid for
    /// `expires_in_secs` seconds.
    ///
    /// Lifetimes too large to represent saturate at the maximum timestamp.
    #[must_use]
    pub fn from_lifetime(
        access_token: SecretString,
        token_type: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_in_secs: u64,
    ) -> Self {
        let secs = i64::try_from(expires_in_secs).unwrap_or(i64::MAX);
        let lifetime = TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX);
        let expires_at = issued_at
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self::new(access_token, token_type, expires_at)
    }

    #[must_use]
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// A token is expired at the instant its expiry is reached.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Value for an outbound `Authorization` header.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        let scheme = if self.token_type.is_empty() || self.token_type.eq_ignore_ascii_case("bearer")
        {
            DEFAULT_TOKEN_TYPE
        } else {
            self.token_type.as_str()
        };
        format!("{scheme} {}", self.access_token.expose_secret())
    }
}
