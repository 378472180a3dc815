//! Token lifecycle integration tests.
//!
//! Runs the manager against a mocked authorization service over real HTTP,
//! with short token lifetimes so refreshes happen within the test.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use auth_client::resources::{Resource, ResourceClient};
use auth_client::secret::ExposeSecret;
use auth_client::{ClientConfig, ManagerState, TokenLifecycleManager};
use auth_test_utils::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config pointing at `auth`, with one-second timers.
fn fast_config(auth: &MockAuthService, api_base_url: &str) -> ClientConfig {
    let mut vars = client_env(&auth.uri(), api_base_url);
    vars.insert("TOKEN_REFRESH_MARGIN_SECONDS".to_string(), "0".to_string());
    vars.insert("TOKEN_MIN_REFRESH_DELAY_SECONDS".to_string(), "1".to_string());
    vars.insert("TOKEN_RETRY_DELAY_SECONDS".to_string(), "1".to_string());
    vars.insert("HTTP_TIMEOUT_SECONDS".to_string(), "5".to_string());
    ClientConfig::from_vars(&vars).unwrap()
}

fn token_value(manager: &TokenLifecycleManager) -> Option<String> {
    manager
        .current_token()
        .map(|t| t.access_token().expose_secret().to_string())
}

#[tokio::test]
async fn test_acquires_and_sends_client_credentials_grant() -> Result<()> {
    let auth = MockAuthService::start().await;
    auth.mock_token_success(TEST_ACCESS_TOKEN, TEST_TOKEN_LIFETIME_SECS)
        .await;

    let manager = TokenLifecycleManager::from_config(&fast_config(&auth, "http://api.invalid"))?;
    let token = manager.authenticate().await?;

    assert_eq!(token.access_token().expose_secret(), TEST_ACCESS_TOKEN);
    assert_eq!(manager.state(), ManagerState::Valid);
    assert!(token.expires_at() > chrono::Utc::now());

    let requests = auth.token_requests().await;
    assert_eq!(requests.len(), 1);
    requests[0]
        .assert_header("content-type", "application/x-www-form-urlencoded")
        .assert_form_field("grant_type", "client_credentials")
        .assert_form_field("client_id", TEST_CLIENT_ID)
        .assert_form_field("client_secret", TEST_CLIENT_SECRET)
        .assert_form_field("scope", "customers:read orders:read");

    manager.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_refreshes_before_expiry() -> Result<()> {
    let auth = MockAuthService::start().await;
    auth.mock_token_success_times("first-token", 2, 1).await;
    auth.mock_token_success("second-token", TEST_TOKEN_LIFETIME_SECS)
        .await;

    let manager = TokenLifecycleManager::from_config(&fast_config(&auth, "http://api.invalid"))?;
    manager.authenticate().await?;
    assert_eq!(token_value(&manager).as_deref(), Some("first-token"));

    tokio::time::sleep(Duration::from_millis(3500)).await;

    assert_eq!(token_value(&manager).as_deref(), Some("second-token"));
    assert_eq!(auth.token_requests().await.len(), 2);

    manager.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_retries_after_failure_and_recovers() -> Result<()> {
    let auth = MockAuthService::start().await;
    auth.mock_token_failure_times(503, 1).await;
    auth.mock_token_success(TEST_ACCESS_TOKEN, TEST_TOKEN_LIFETIME_SECS)
        .await;

    let manager = TokenLifecycleManager::from_config(&fast_config(&auth, "http://api.invalid"))?;

    // Background start never surfaces the failure.
    manager.start().await;
    assert_eq!(manager.state(), ManagerState::RetryBackoff);
    assert!(manager.current_token().is_none());

    let token = tokio::time::timeout(Duration::from_secs(5), manager.wait_until_valid()).await??;

    assert_eq!(token.access_token().expose_secret(), TEST_ACCESS_TOKEN);
    assert_eq!(auth.token_requests().await.len(), 2);

    manager.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_rejected_credentials_returned_to_explicit_caller() -> Result<()> {
    let auth = MockAuthService::start().await;
    auth.mock_token_failure(401).await;

    let manager = TokenLifecycleManager::from_config(&fast_config(&auth, "http://api.invalid"))?;
    let err = manager.authenticate().await.unwrap_err();

    assert!(err.is_retryable());
    assert!(err.to_string().contains("401"));
    assert_eq!(manager.state(), ManagerState::RetryBackoff);

    manager.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_no_requests_after_shutdown() -> Result<()> {
    let auth = MockAuthService::start().await;
    auth.mock_token_success(TEST_ACCESS_TOKEN, 1).await;

    let manager = TokenLifecycleManager::from_config(&fast_config(&auth, "http://api.invalid"))?;
    manager.authenticate().await?;
    manager.shutdown();

    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(auth.token_requests().await.len(), 1);
    assert_eq!(manager.state(), ManagerState::Stopped);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_readers_never_trigger_authentication() -> Result<()> {
    let auth = MockAuthService::start().await;
    auth.mock_token_success_times("first-token", 2, 1).await;
    auth.mock_token_slow("second-token", TEST_TOKEN_LIFETIME_SECS, Duration::from_millis(300))
        .await;

    let manager = Arc::new(TokenLifecycleManager::from_config(&fast_config(
        &auth,
        "http://api.invalid",
    ))?);
    manager.authenticate().await?;

    // Readers run across the refresh; each read is a whole token or nothing.
    let readers: Vec<_> = (0..16)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                for _ in 0..60 {
                    if let Some(token) = manager.current_token() {
                        let value = token.access_token().expose_secret().to_string();
                        assert!(value == "first-token" || value == "second-token");
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            })
        })
        .collect();

    for reader in readers {
        reader.await?;
    }

    assert_eq!(token_value(&manager).as_deref(), Some("second-token"));
    assert_eq!(auth.token_requests().await.len(), 2);

    manager.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_resource_client_uses_managed_token() -> Result<()> {
    let auth = MockAuthService::start().await;
    auth.mock_token_success(TEST_ACCESS_TOKEN, TEST_TOKEN_LIFETIME_SECS)
        .await;

    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/orders/orders"))
        .and(header(
            "authorization",
            format!("Bearer {TEST_ACCESS_TOKEN}").as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "o-1"}])))
        .expect(1)
        .mount(&api)
        .await;

    let config = fast_config(&auth, &api.uri());
    let manager = TokenLifecycleManager::from_config(&config)?;
    let resources = ResourceClient::from_config(&config, manager.store())?;

    // Before the first acquisition there is nothing to send.
    assert!(resources.list::<Value>(Resource::Orders).await.is_err());

    manager.authenticate().await?;
    let orders: Vec<Value> = resources.list(Resource::Orders).await?;

    assert_eq!(orders.len(), 1);
    assert_eq!(auth.token_requests().await.len(), 1);

    manager.shutdown();
    Ok(())
}
