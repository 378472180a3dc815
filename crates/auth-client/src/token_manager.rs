//! OAuth 2.0 client-credentials token lifecycle manager.
//!
//! Acquires a bearer token, caches it in a [`TokenStore`], and keeps it fresh
//! from a single background refresh loop.
//!
//! # Features
//!
//! - Proactive refresh `refresh_margin` before expiry
//! - Refresh timers are clamped to a minimum positive delay (no tight loops)
//! - Fixed-delay retry after an authentication or store-write failure
//! - One authentication in flight per manager; readers only touch the store
//! - Background failures are logged and retried, never surfaced to readers
//! - Explicit shutdown cancels the pending timer; late results are discarded
//!
//! # States
//!
//! ```text
//! Unauthenticated -> Authenticating -> Valid -> Refreshing -> Valid
//!                          |                        |
//!                          +----> RetryBackoff <----+
//! ```
//!
//! `Stopped` is entered on shutdown and is final.
//!
//! # Example
//!
//! ```rust,ignore
//! use auth_client::{ClientConfig, TokenLifecycleManager};
//!
//! let config = ClientConfig::from_env()?;
//! let manager = TokenLifecycleManager::from_config(&config)?;
//!
//! // First acquisition; failures are logged and retried in the background.
//! manager.start().await;
//!
//! if let Some(token) = manager.current_token() {
//!     let header = token.authorization_header();
//! }
//!
//! manager.shutdown();
//! ```

use crate::authenticator::{HttpTokenAuthenticator, TokenAuthenticator};
use crate::config::{ClientConfig, ClientCredentials};
use crate::error::TokenError;
use crate::token::TokenDescriptor;
use crate::token_store::{InMemoryTokenStore, TokenStore};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Instrument};

// =============================================================================
// Constants
// =============================================================================

/// Default refresh margin (refresh this long before expiration).
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Default delay before retrying a failed authentication or store write.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Default lower bound on an armed refresh timer.
pub const DEFAULT_MIN_REFRESH_DELAY: Duration = Duration::from_secs(5);

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// No timer is ever armed below this, whatever the configuration says.
const TIMER_FLOOR: Duration = Duration::from_secs(1);

// =============================================================================
// Configuration
// =============================================================================

/// Timing configuration for the token manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenManagerConfig {
    /// Refresh this long before the token expires.
    pub refresh_margin: Duration,

    /// Delay before retrying after a failure.
    pub retry_delay: Duration,

    /// Lower bound on any refresh timer.
    pub min_refresh_delay: Duration,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            retry_delay: DEFAULT_RETRY_DELAY,
            min_refresh_delay: DEFAULT_MIN_REFRESH_DELAY,
        }
    }
}

impl TokenManagerConfig {
    /// Set the refresh margin.
    #[must_use]
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Set the retry delay.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the minimum refresh delay.
    #[must_use]
    pub fn with_min_refresh_delay(mut self, delay: Duration) -> Self {
        self.min_refresh_delay = delay;
        self
    }
}

/// Delay until the next refresh of a token expiring at `expires_at`.
///
/// Equals the remaining lifetime minus `margin`, clamped below by `min` (and by
/// a one-second floor). Never zero.
#[must_use]
pub fn refresh_delay(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    margin: Duration,
    min: Duration,
) -> Duration {
    let remaining = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
    remaining
        .saturating_sub(margin)
        .max(min)
        .max(TIMER_FLOOR)
}

// =============================================================================
// State
// =============================================================================

/// Lifecycle state of a [`TokenLifecycleManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// No authentication attempted yet.
    Unauthenticated,
    /// First acquisition (or a retry) in flight.
    Authenticating,
    /// A token is cached and a refresh timer is armed.
    Valid,
    /// Timer-driven refresh in flight.
    Refreshing,
    /// Last attempt failed; a retry timer is armed.
    RetryBackoff,
    /// Shut down; no further timers will fire.
    Stopped,
}

/// What the pending timer will do when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Proactive refresh of a valid token.
    Refresh,
    /// Retry after a failure.
    Retry,
}

/// The single armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRefresh {
    pub kind: RefreshKind,
    /// Delay the timer was armed with.
    pub delay: Duration,
    deadline: Instant,
}

// =============================================================================
// Manager
// =============================================================================

struct Inner {
    credentials: ClientCredentials,
    authenticator: Arc<dyn TokenAuthenticator>,
    store: Arc<dyn TokenStore>,
    config: TokenManagerConfig,
    state: watch::Sender<ManagerState>,
    schedule: watch::Sender<Option<PendingRefresh>>,
    in_flight: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
    refresh_loop: Mutex<Option<JoinHandle<()>>>,
}

/// Owns the token lifecycle for one set of client credentials.
///
/// Not `Clone`: share it behind an `Arc`. Dropping the manager cancels the
/// pending timer.
pub struct TokenLifecycleManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TokenLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLifecycleManager")
            .field("client_id", &self.inner.credentials.client_id())
            .field("state", &*self.inner.state.borrow())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl TokenLifecycleManager {
    /// Create a manager. Nothing happens on the network until
    /// [`authenticate`](Self::authenticate) or [`start`](Self::start).
    #[must_use]
    pub fn new(
        credentials: ClientCredentials,
        authenticator: Arc<dyn TokenAuthenticator>,
        store: Arc<dyn TokenStore>,
        config: TokenManagerConfig,
    ) -> Self {
        let (state, _) = watch::channel(ManagerState::Unauthenticated);
        let (schedule, _) = watch::channel(None);

        Self {
            inner: Arc::new(Inner {
                credentials,
                authenticator,
                store,
                config,
                state,
                schedule,
                in_flight: tokio::sync::Mutex::new(()),
                shutdown: CancellationToken::new(),
                refresh_loop: Mutex::new(None),
            }),
        }
    }

    /// Create a manager with the HTTP authenticator and an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TokenError> {
        let authenticator = HttpTokenAuthenticator::new(&config.auth_domain, config.http_timeout)?;

        Ok(Self::new(
            config.credentials.clone(),
            Arc::new(authenticator),
            Arc::new(InMemoryTokenStore::new()),
            config.token_manager_config(),
        ))
    }

    /// The store this manager writes to.
    #[must_use]
    pub fn store(&self) -> Arc<dyn TokenStore> {
        Arc::clone(&self.inner.store)
    }

    /// Acquire a token now and arm the next timer.
    ///
    /// On success the token is cached and a refresh is scheduled. On failure a
    /// retry is scheduled and the error is returned to this caller only.
    ///
    /// # Errors
    ///
    /// - `TokenError::AuthService` if the exchange failed
    /// - `TokenError::StoreWrite` if the token could not be cached
    /// - `TokenError::Shutdown` if the manager was shut down
    #[instrument(skip_all, fields(client_id = %self.inner.credentials.client_id()))]
    pub async fn authenticate(&self) -> Result<TokenDescriptor, TokenError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(TokenError::Shutdown);
        }
        self.ensure_refresh_loop();
        self.inner.run_cycle(ManagerState::Authenticating).await
    }

    /// Like [`authenticate`](Self::authenticate), but failures are only logged.
    ///
    /// Returns once the first attempt has completed; a retry is already armed
    /// if it failed.
    pub async fn start(&self) {
        if let Err(e) = self.authenticate().await {
            warn!(
                target: "auth_client.token_manager",
                client_id = %self.inner.credentials.client_id(),
                error = %e,
                "Initial token acquisition failed, retry scheduled"
            );
        }
    }

    /// Wait until a usable token is cached.
    ///
    /// Resolves immediately when the store already holds an unexpired token,
    /// whatever the state (a failed refresh leaves the previous token usable).
    /// Callers wanting a startup deadline should wrap this in
    /// `tokio::time::timeout`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Shutdown` if the manager stops first.
    pub async fn wait_until_valid(&self) -> Result<TokenDescriptor, TokenError> {
        let mut rx = self.inner.state.subscribe();
        loop {
            // Mark the current state seen before reading the store so a
            // transition in between still wakes `changed()`.
            if *rx.borrow_and_update() == ManagerState::Stopped {
                return Err(TokenError::Shutdown);
            }
            if let Some(token) = self.current_token() {
                return Ok(token);
            }
            rx.changed().await.map_err(|_| TokenError::Shutdown)?;
        }
    }

    /// The cached token if present and unexpired. Never blocks on the network.
    #[must_use]
    pub fn current_token(&self) -> Option<TokenDescriptor> {
        self.inner.store.get()
    }

    #[must_use]
    pub fn state(&self) -> ManagerState {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every state transition.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ManagerState> {
        self.inner.state.subscribe()
    }

    /// The currently armed timer, if any.
    #[must_use]
    pub fn pending_refresh(&self) -> Option<PendingRefresh> {
        *self.inner.schedule.borrow()
    }

    /// Delay the pending timer was armed with.
    #[must_use]
    pub fn next_refresh_delay(&self) -> Option<Duration> {
        self.pending_refresh().map(|pending| pending.delay)
    }

    /// Cancel the pending timer and stop the refresh loop.
    ///
    /// An authentication already in flight is allowed to finish but its
    /// result is discarded. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.shutdown.cancel();
        self.inner.schedule.send_replace(None);
        self.inner.state.send_replace(ManagerState::Stopped);

        // The loop exits on its own once it observes cancellation.
        if let Ok(mut slot) = self.inner.refresh_loop.lock() {
            slot.take();
        }

        info!(
            target: "auth_client.token_manager",
            client_id = %self.inner.credentials.client_id(),
            "Token manager shut down"
        );
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn ensure_refresh_loop(&self) {
        let Ok(mut slot) = self.inner.refresh_loop.lock() else {
            return;
        };
        if slot.is_some() || self.inner.shutdown.is_cancelled() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let schedule_rx = self.inner.schedule.subscribe();
        let span = tracing::info_span!(
            "auth_client.token_manager.refresh_loop",
            client_id = %self.inner.credentials.client_id()
        );
        *slot = Some(tokio::spawn(
            refresh_loop(inner, schedule_rx).instrument(span),
        ));
    }
}

impl Drop for TokenLifecycleManager {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    /// One authentication attempt followed by arming the next timer.
    async fn run_cycle(&self, phase: ManagerState) -> Result<TokenDescriptor, TokenError> {
        let _guard = self.in_flight.lock().await;
        if self.shutdown.is_cancelled() {
            return Err(TokenError::Shutdown);
        }

        self.set_state(phase);
        let result = self.authenticator.authenticate(&self.credentials).await;

        if self.shutdown.is_cancelled() {
            debug!(
                target: "auth_client.token_manager",
                client_id = %self.credentials.client_id(),
                "Discarding authentication result after shutdown"
            );
            return Err(TokenError::Shutdown);
        }

        let outcome = result.and_then(|token| {
            self.store.set(token.clone())?;
            Ok(token)
        });

        match outcome {
            Ok(token) => {
                let now = Utc::now();
                let delay = refresh_delay(
                    token.expires_at(),
                    now,
                    self.config.refresh_margin,
                    self.config.min_refresh_delay,
                );

                if token.is_expired_at(now) {
                    warn!(
                        target: "auth_client.token_manager",
                        client_id = %self.credentials.client_id(),
                        "Auth service issued an already-expired token, refreshing soon"
                    );
                }

                self.set_state(ManagerState::Valid);
                self.arm(RefreshKind::Refresh, delay);

                if phase == ManagerState::Refreshing {
                    debug!(
                        target: "auth_client.token_manager",
                        client_id = %self.credentials.client_id(),
                        refresh_in_secs = delay.as_secs(),
                        "Token refreshed successfully"
                    );
                } else {
                    info!(
                        target: "auth_client.token_manager",
                        client_id = %self.credentials.client_id(),
                        expires_at = %token.expires_at(),
                        refresh_in_secs = delay.as_secs(),
                        "Token acquired successfully"
                    );
                }

                Ok(token)
            }
            Err(e) => {
                let delay = self.config.retry_delay.max(TIMER_FLOOR);
                warn!(
                    target: "auth_client.token_manager",
                    client_id = %self.credentials.client_id(),
                    error = %e,
                    retry_in_secs = delay.as_secs(),
                    "Token acquisition failed, will retry"
                );

                self.set_state(ManagerState::RetryBackoff);
                self.arm(RefreshKind::Retry, delay);

                Err(e)
            }
        }
    }

    /// Replace the pending timer. There is never more than one.
    fn arm(&self, kind: RefreshKind, delay: Duration) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let delay = delay.max(TIMER_FLOOR);
        self.schedule.send_replace(Some(PendingRefresh {
            kind,
            delay,
            deadline: Instant::now() + delay,
        }));
    }

    fn set_state(&self, next: ManagerState) {
        self.state.send_if_modified(|current| {
            if *current == ManagerState::Stopped || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Background loop that waits for the armed timer and runs the refresh.
async fn refresh_loop(inner: Arc<Inner>, mut schedule_rx: watch::Receiver<Option<PendingRefresh>>) {
    loop {
        let next = *schedule_rx.borrow_and_update();

        match next {
            None => {
                tokio::select! {
                    biased;
                    () = inner.shutdown.cancelled() => break,
                    changed = schedule_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            Some(pending) => {
                tokio::select! {
                    biased;
                    () = inner.shutdown.cancelled() => break,
                    changed = schedule_rx.changed() => {
                        // Re-armed by an explicit authenticate(); pick up the new deadline.
                        if changed.is_err() {
                            break;
                        }
                    }
                    () = tokio::time::sleep_until(pending.deadline) => {
                        inner.schedule.send_replace(None);
                        let phase = match pending.kind {
                            RefreshKind::Refresh => ManagerState::Refreshing,
                            RefreshKind::Retry => ManagerState::Authenticating,
                        };
                        // Failures are logged and a retry is armed inside run_cycle.
                        let _ = inner.run_cycle(phase).await;
                    }
                }
            }
        }
    }

    debug!(
        target: "auth_client.token_manager",
        client_id = %inner.credentials.client_id(),
        "Refresh loop stopped"
    );
}

// =============================================================================
// Tests
// =============================================================================
