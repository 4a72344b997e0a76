//! Named mutex façade over the lock store.
//!
//! Produces TTL-bounded locks for arbitrary logical resources: config
//! initialization (`global-config-init`), scheduled-task execution
//! (`scheduled-task:{name}`), recording slots (`recording:{roomId}`).
//!
//! Contention is a normal outcome, not an error: `acquire` returns
//! `Ok(None)` and the caller decides whether that means "skip this run" or
//! "wait and retry". A store failure is an error, and callers must treat it
//! as "cannot safely proceed".

use crate::errors::CoordinationError;
use crate::lock::{lock_key, LockGuard, LockStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Named, TTL-bounded mutual exclusion over the shared lock store.
#[derive(Clone)]
pub struct MutexService {
    store: Arc<dyn LockStore>,
}

impl MutexService {
    #[must_use]
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self { store }
    }

    /// The underlying lock store. Maintenance sweeps use this directly for
    /// key-level operations (enumeration, force release) that fall outside
    /// the named acquire/release contract.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LockStore> {
        &self.store
    }

    /// Try to take the named lock for `ttl`. A fresh holder token is
    /// minted per attempt, so two attempts by the same process are two
    /// distinct holders.
    ///
    /// Returns `Ok(None)` when another holder is present. Never blocks or
    /// retries internally.
    ///
    /// # Errors
    ///
    /// Returns `CoordinationError::Store` if the coordination store is
    /// unreachable; callers must not proceed unlocked.
    pub async fn acquire(
        &self,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<LockGuard>, CoordinationError> {
        let key = lock_key(name);
        let token = Uuid::new_v4().to_string();

        if self.store.try_acquire(&key, &token, ttl).await? {
            debug!(
                target: "coordination.mutex",
                name = %name,
                ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
                "Lock acquired"
            );
            Ok(Some(LockGuard::new(key, token, ttl)))
        } else {
            debug!(
                target: "coordination.mutex",
                name = %name,
                "Lock held elsewhere"
            );
            Ok(None)
        }
    }

    /// Release a held lock. A lease that already expired (or was
    /// re-acquired by another holder after expiry) is a safe no-op.
    ///
    /// # Errors
    ///
    /// Returns `CoordinationError::Store` if the store is unreachable; the
    /// lease will still lapse on its own TTL.
    pub async fn release(&self, guard: &LockGuard) -> Result<(), CoordinationError> {
        let released = self.store.release(guard.key(), guard.token()).await?;
        debug!(
            target: "coordination.mutex",
            key = %guard.key(),
            released,
            "Lock release attempted"
        );
        Ok(())
    }
}
