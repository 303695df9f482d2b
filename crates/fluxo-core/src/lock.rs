//! Advisory locking for read-then-write mutation paths
//!
//! The backing row store has no native transactions across reads and
//! writes, so mutating operations that read current state before writing
//! (settlement, bulk settle, reconciliation) serialize behind a
//! coarse-grained advisory lock. Scopes are plain strings; the default
//! scope covers the whole document, but the same manager supports finer
//! scopes if a backing store with row-level locking swaps in.
//!
//! Release is guaranteed by `Drop` on the guard, so every exit path
//! (success, validation failure, panic unwind) frees the scope.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Error, Result};

/// Default lock acquisition timeout
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Scope covering the whole document (all tables)
pub const SCOPE_DOCUMENT: &str = "document";

/// Manager handing out scoped advisory locks
#[derive(Debug, Default)]
pub struct LockManager {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the named scope, waiting up to `timeout`.
    ///
    /// Fails with `Error::LockTimeout` if another holder does not release
    /// the scope in time; callers should retry.
    pub fn acquire(&self, scope: &str, timeout: Duration) -> Result<LockGuard<'_>> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());

        while held.contains(scope) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::LockTimeout {
                    scope: scope.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            let (guard, wait) = self
                .released
                .wait_timeout(held, remaining)
                .unwrap_or_else(|e| e.into_inner());
            held = guard;
            if wait.timed_out() && held.contains(scope) {
                return Err(Error::LockTimeout {
                    scope: scope.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        }

        held.insert(scope.to_string());
        debug!(scope, "advisory lock acquired");
        Ok(LockGuard {
            manager: self,
            scope: scope.to_string(),
        })
    }

    /// Acquire with the default timeout
    pub fn acquire_default(&self, scope: &str) -> Result<LockGuard<'_>> {
        self.acquire(scope, DEFAULT_LOCK_TIMEOUT)
    }
}

/// Held advisory lock; releases its scope on drop
#[derive(Debug)]
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    scope: String,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .manager
            .held
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        held.remove(&self.scope);
        self.manager.released.notify_all();
        debug!(scope = %self.scope, "advisory lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let manager = LockManager::new();
        {
            let _guard = manager
                .acquire(SCOPE_DOCUMENT, Duration::from_millis(100))
                .unwrap();
            // Scope is busy while the guard is alive
            let err = manager
                .acquire(SCOPE_DOCUMENT, Duration::from_millis(10))
                .unwrap_err();
            assert!(matches!(err, Error::LockTimeout { .. }));
        }
        // Released on drop
        let _guard = manager
            .acquire(SCOPE_DOCUMENT, Duration::from_millis(10))
            .unwrap();
    }

    #[test]
    fn test_independent_scopes_do_not_block() {
        let manager = LockManager::new();
        let _a = manager.acquire("ledger", Duration::from_millis(10)).unwrap();
        let _b = manager
            .acquire("statements", Duration::from_millis(10))
            .unwrap();
    }

    #[test]
    fn test_release_unblocks_waiter() {
        use std::sync::Arc;

        let manager = Arc::new(LockManager::new());
        let guard = manager
            .acquire(SCOPE_DOCUMENT, Duration::from_millis(100))
            .unwrap();

        let waiter = {
            let manager = Arc::clone(&manager);
            std::thread::spawn(move || {
                manager
                    .acquire(SCOPE_DOCUMENT, Duration::from_secs(2))
                    .is_ok()
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        drop(guard);
        assert!(waiter.join().unwrap());
    }
}
