//! Wiremock-backed stand-in for the authorization service
//!
//! Serves `POST /oauth2/token` (client-credentials exchange) and
//! `POST /oauth2/authenticate` (inbound token validation).

use crate::response_builders::token_response;
use serde_json::Value;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const TOKEN_PATH: &str = "/oauth2/token";
pub const AUTHENTICATE_PATH: &str = "/oauth2/authenticate";

/// Mock authorization service.
///
/// Mocks are matched in mount order, so a `*_times` mock mounted first takes
/// precedence until it is used up.
///
/// # Example
/// ```rust,ignore
/// let auth = MockAuthService::start().await;
/// auth.mock_token_failure_times(503, 1).await;
/// auth.mock_token_success("token-abc", 3600).await;
/// ```
pub struct MockAuthService {
    server: MockServer,
}

impl MockAuthService {
    /// Start on a random local port.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL, usable as `AUTH_DOMAIN`.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Underlying server, for custom mocks.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    // -------------------------------------------------------------------------
    // /oauth2/token
    // -------------------------------------------------------------------------

    /// Issue `access_token` valid for `expires_in` seconds on every call.
    pub async fn mock_token_success(&self, access_token: &str, expires_in: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(token_response(access_token, expires_in)),
            )
            .mount(&self.server)
            .await;
    }

    /// Issue `access_token` after `delay`.
    pub async fn mock_token_slow(&self, access_token: &str, expires_in: u64, delay: Duration) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_response(access_token, expires_in))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Issue `access_token` for the next `times` calls only.
    pub async fn mock_token_success_times(&self, access_token: &str, expires_in: u64, times: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(token_response(access_token, expires_in)),
            )
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Fail every token request with `status`.
    pub async fn mock_token_failure(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string("token request failed"))
            .mount(&self.server)
            .await;
    }

    /// Fail the next `times` token requests with `status`.
    pub async fn mock_token_failure_times(&self, status: u16, times: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string("token request failed"))
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Token requests received so far.
    pub async fn token_requests(&self) -> Vec<Request> {
        self.requests_to(TOKEN_PATH).await
    }

    // -------------------------------------------------------------------------
    // /oauth2/authenticate
    // -------------------------------------------------------------------------

    /// Accept every inbound token and answer with `body`.
    pub async fn mock_authenticate_success(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path(AUTHENTICATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Reject every inbound token with `status`.
    pub async fn mock_authenticate_failure(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(AUTHENTICATE_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                "message": "token rejected"
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer with 200 and an unparsable body.
    pub async fn mock_authenticate_garbage(&self) {
        Mock::given(method("POST"))
            .and(path(AUTHENTICATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&self.server)
            .await;
    }

    /// Authenticate requests received so far.
    pub async fn authenticate_requests(&self) -> Vec<Request> {
        self.requests_to(AUTHENTICATE_PATH).await
    }

    async fn requests_to(&self, wanted: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == wanted)
            .collect()
    }
}
