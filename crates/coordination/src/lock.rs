//! Lease-based distributed lock primitive.
//!
//! A lock is a TTL-bounded key in the coordination store holding an opaque
//! token that identifies the holder instance+attempt. Mutual exclusion rests
//! on exactly two atomic store operations:
//!
//! - create-if-absent-with-ttl (`SET key token NX PX ttl`)
//! - delete-if-value-matches (Lua compare-and-delete)
//!
//! No heartbeats: every lock self-expires, so a crashed holder's resource
//! becomes available again within one TTL window.

use crate::errors::CoordinationError;
use async_trait::async_trait;
use std::time::Duration;

/// Namespace prefix for every lock key this core writes.
pub const LOCK_KEY_PREFIX: &str = "atrium:lock:";

/// Build the full store key for a logical lock name.
#[must_use]
pub fn lock_key(name: &str) -> String {
    format!("{LOCK_KEY_PREFIX}{name}")
}

/// Backing store for distributed locks.
///
/// Implemented by [`crate::redis::RedisLockStore`] in production and by an
/// in-memory store in tests. All methods are single non-blocking round
/// trips; none retry internally.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically create `key = token` with expiry `ttl` if the key does
    /// not exist. Returns `true` if the lock was taken, `false` if another
    /// holder is present.
    async fn try_acquire(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, CoordinationError>;

    /// Atomically delete `key` only if its stored value still equals
    /// `token`. Returns `true` if the key was deleted. Releasing a lock
    /// whose TTL already elapsed (or that was re-acquired by someone else)
    /// returns `false` and is a safe no-op.
    async fn release(&self, key: &str, token: &str) -> Result<bool, CoordinationError>;

    /// Unconditionally delete `key`, regardless of holder. Reserved for the
    /// staleness and orphaned-lock sweeps, which do not hold the owner
    /// token. Returns `true` if a key was removed.
    async fn force_release(&self, key: &str) -> Result<bool, CoordinationError>;

    /// Remaining time-to-live of `key`, or `None` if the key does not
    /// exist (or carries no expiry).
    async fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>, CoordinationError>;

    /// List all keys starting with `prefix`. Used by the orphaned-lock
    /// sweep to enumerate per-room recording locks.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, CoordinationError>;
}

/// Handle to a successfully acquired lock.
///
/// Holds the full store key, the holder token required for a safe release,
/// and the TTL the lease was taken with. Dropping the guard does NOT
/// release the lock; the lease either expires or is released explicitly.
#[derive(Debug, Clone)]
pub struct LockGuard {
    key: String,
    token: String,
    ttl: Duration,
}

impl LockGuard {
    pub(crate) fn new(key: String, token: String, ttl: Duration) -> Self {
        Self { key, token, ttl }
    }

    /// Full store key of this lock.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Opaque holder token. Required to release safely.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// TTL the lease was acquired with.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
