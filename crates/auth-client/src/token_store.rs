//! Single-slot bearer token cache.
//!
//! The store holds at most one token. Every successful write fully replaces
//! the previous entry. Readers clone the descriptor out under a short borrow,
//! so they observe either the old or the new token, never a mix.
//!
//! The store is an explicitly owned value passed to the components that need
//! it (typically as `Arc<dyn TokenStore>`), so tests can substitute a fake.

use crate::error::TokenError;
use crate::token::TokenDescriptor;
use tokio::sync::watch;

/// Thread-safe single-slot token cache.
pub trait TokenStore: Send + Sync {
    /// Replace the cached token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::StoreWrite` if the backing store rejected the
    /// write. The previous entry is left untouched in that case.
    fn set(&self, token: TokenDescriptor) -> Result<(), TokenError>;

    /// The cached token regardless of expiry.
    fn peek(&self) -> Option<TokenDescriptor>;

    /// Drop the cached token.
    fn clear(&self);

    /// The cached token, or `None` if absent or already expired.
    fn get(&self) -> Option<TokenDescriptor> {
        self.peek().filter(|token| !token.is_expired())
    }
}

/// In-process store backed by a `tokio::sync::watch` channel.
///
/// The channel doubles as a change feed: [`InMemoryTokenStore::subscribe`]
/// hands out receivers that wake on every successful `set` or `clear`.
#[derive(Debug)]
pub struct InMemoryTokenStore {
    slot: watch::Sender<Option<TokenDescriptor>>,
}

impl InMemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot }
    }

    /// Receiver notified whenever the slot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<TokenDescriptor>> {
        self.slot.subscribe()
    }
}

impl Default for InMemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn set(&self, token: TokenDescriptor) -> Result<(), TokenError> {
        self.slot.send_replace(Some(token));
        Ok(())
    }

    fn peek(&self) -> Option<TokenDescriptor> {
        self.slot.borrow().clone()
    }

    fn clear(&self) {
        self.slot.send_replace(None);
    }
}

/// Store doubles for tests.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that rejects a configurable number of writes before accepting.
    #[derive(Debug)]
    pub struct FailingTokenStore {
        inner: InMemoryTokenStore,
        failures_remaining: AtomicUsize,
        write_attempts: AtomicUsize,
    }

    impl FailingTokenStore {
        /// Fail the first `failures` writes, then behave like an in-memory store.
        #[must_use]
        pub fn failing_first(failures: usize) -> Self {
            Self {
                inner: InMemoryTokenStore::new(),
                failures_remaining: AtomicUsize::new(failures),
                write_attempts: AtomicUsize::new(0),
            }
        }

        /// Start out holding `token`, then fail the next `failures` writes.
        #[must_use]
        pub fn seeded(token: TokenDescriptor, failures: usize) -> Self {
            let store = Self::failing_first(failures);
            store.inner.slot.send_replace(Some(token));
            store
        }

        /// Fail every write.
        #[must_use]
        pub fn always_failing() -> Self {
            Self::failing_first(usize::MAX)
        }

        /// Number of `set` calls seen, successful or not.
        #[must_use]
        pub fn write_attempts(&self) -> usize {
            self.write_attempts.load(Ordering::SeqCst)
        }
    }

    impl TokenStore for FailingTokenStore {
        fn set(&self, token: TokenDescriptor) -> Result<(), TokenError> {
            self.write_attempts.fetch_add(1, Ordering::SeqCst);

            let failed = self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(TokenError::StoreWrite("capacity exceeded".to_string()));
            }

            self.inner.set(token)
        }

        fn peek(&self) -> Option<TokenDescriptor> {
            self.inner.peek()
        }

        fn clear(&self) {
            self.inner.clear();
        }
    }
}
