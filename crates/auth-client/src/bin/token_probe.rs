//! Token probe
//!
//! Loads client configuration from the environment, keeps a token fresh
//! against the configured auth service, and logs every lifecycle transition
//! until interrupted.

use auth_client::{ClientConfig, ManagerState, TokenLifecycleManager};
use std::future::Future;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_client=debug,token_probe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting token probe");

    let config = ClientConfig::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        auth_domain = %config.auth_domain,
        client_id = %config.credentials.client_id(),
        scopes = %config.credentials.scope_string(),
        refresh_margin_secs = config.refresh_margin.as_secs(),
        retry_delay_secs = config.retry_delay.as_secs(),
        "Configuration loaded successfully"
    );

    let manager = TokenLifecycleManager::from_config(&config)?;
    run(&manager, shutdown_signal()).await;

    info!("Token probe shutdown complete");

    Ok(())
}

/// Drive the manager until `shutdown` resolves, then stop it.
///
/// The first acquisition races the shutdown signal, so an interrupt during a
/// slow token exchange is honoured immediately.
async fn run(manager: &TokenLifecycleManager, shutdown: impl Future<Output = ()>) {
    let mut states = manager.subscribe_state();
    tokio::pin!(shutdown);

    let interrupted = tokio::select! {
        () = &mut shutdown => true,
        () = manager.start() => false,
    };

    if !interrupted {
        log_state(manager, *states.borrow_and_update());
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *states.borrow_and_update();
                    log_state(manager, state);
                }
            }
        }
    }

    manager.shutdown();
}

fn log_state(manager: &TokenLifecycleManager, state: ManagerState) {
    match state {
        ManagerState::Valid => match manager.current_token() {
            Some(token) => info!(
                expires_at = %token.expires_at(),
                next_refresh_secs = manager.next_refresh_delay().map(|d| d.as_secs()),
                "Token valid"
            ),
            None => warn!("Token reported valid but none is usable"),
        },
        ManagerState::RetryBackoff => warn!(
            retry_in_secs = manager.next_refresh_delay().map(|d| d.as_secs()),
            "Token acquisition failing"
        ),
        other => info!(state = ?other, "Token manager state changed"),
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, shutting down..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, shutting down...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use auth_test_utils::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_interrupts_slow_first_exchange() {
        let auth = MockAuthService::start().await;
        auth.mock_token_slow(TEST_ACCESS_TOKEN, TEST_TOKEN_LIFETIME_SECS, Duration::from_secs(30))
            .await;

        let mut vars = client_env(&auth.uri(), "http://127.0.0.1:9");
        vars.insert("HTTP_TIMEOUT_SECONDS".to_string(), "60".to_string());
        let manager = TokenLifecycleManager::from_config(&ClientConfig::from_vars(&vars).unwrap()).unwrap();

        let shutdown = tokio::time::sleep(Duration::from_millis(100));
        tokio::time::timeout(Duration::from_secs(5), run(&manager, shutdown))
            .await
            .expect("shutdown should not wait for the token exchange");

        assert!(manager.is_shut_down());
        assert!(manager.current_token().is_none());
    }

    #[tokio::test]
    async fn test_run_stops_manager_after_acquisition() {
        let auth = MockAuthService::start().await;
        auth.mock_token_success(TEST_ACCESS_TOKEN, TEST_TOKEN_LIFETIME_SECS)
            .await;

        let manager =
            TokenLifecycleManager::from_config(&ClientConfig::from_vars(&client_env(&auth.uri(), "http://127.0.0.1:9")).unwrap())
                .unwrap();

        run(&manager, tokio::time::sleep(Duration::from_millis(200))).await;

        assert!(manager.is_shut_down());
        assert_eq!(manager.state(), ManagerState::Stopped);
        assert_eq!(auth.token_requests().await.len(), 1);
    }
}
