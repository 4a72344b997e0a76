//! In-memory lock store for coordination tests.
//!
//! Provides an in-memory implementation of the [`LockStore`] contract:
//! atomic create-if-absent with TTL, delete-if-owner, forced release and
//! key enumeration. Expiry is driven by `tokio::time::Instant`, so tests
//! using `start_paused` can advance the clock deterministically past a
//! lease's TTL.
//!
//! # Example
//!
//! ```rust,ignore
//! use coordination_test_utils::MockLockStore;
//!
//! let store = MockLockStore::new();
//!
//! assert!(store.try_acquire("k", "a", Duration::from_secs(5)).await?);
//! assert!(!store.try_acquire("k", "b", Duration::from_secs(5)).await?);
//!
//! // Simulate a store outage: every operation fails closed
//! store.set_unavailable(true);
//! assert!(store.try_acquire("k2", "a", Duration::from_secs(5)).await.is_err());
//! ```

use async_trait::async_trait;
use coordination::{CoordinationError, LockStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// In-memory [`LockStore`] with fault injection.
#[derive(Debug, Clone, Default)]
pub struct MockLockStore {
    inner: Arc<Mutex<MockLockStoreInner>>,
}

#[derive(Debug, Default)]
struct MockLockStoreInner {
    locks: HashMap<String, LockEntry>,
    /// When set, every operation returns a store error (outage simulation).
    unavailable: bool,
}

#[derive(Debug, Clone)]
struct LockEntry {
    token: String,
    expires_at: Instant,
    ttl: Duration,
}

impl MockLockStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the simulated outage. While unavailable, every `LockStore`
    /// operation returns `CoordinationError::Store`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Current holder token for `key`, if a live lease exists.
    #[must_use]
    pub fn holder(&self, key: &str) -> Option<String> {
        let mut inner = self.lock();
        purge_if_expired(&mut inner, key);
        inner.locks.get(key).map(|e| e.token.clone())
    }

    /// Number of live leases.
    #[must_use]
    pub fn live_lock_count(&self) -> usize {
        let mut inner = self.lock();
        let now = Instant::now();
        inner.locks.retain(|_, e| e.expires_at > now);
        inner.locks.len()
    }

    /// Drop all state.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.locks.clear();
        inner.unavailable = false;
    }

    /// TTL a lease was originally acquired with (test assertions on
    /// derived TTLs).
    #[must_use]
    pub fn acquired_ttl(&self, key: &str) -> Option<Duration> {
        let mut inner = self.lock();
        purge_if_expired(&mut inner, key);
        inner.locks.get(key).map(|e| e.ttl)
    }

    fn lock(&self) -> MutexGuard<'_, MockLockStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(inner: &MockLockStoreInner) -> Result<(), CoordinationError> {
        if inner.unavailable {
            return Err(CoordinationError::Store(
                "simulated store outage".to_string(),
            ));
        }
        Ok(())
    }
}

fn purge_if_expired(inner: &mut MockLockStoreInner, key: &str) {
    if let Some(entry) = inner.locks.get(key) {
        if entry.expires_at <= Instant::now() {
            inner.locks.remove(key);
        }
    }
}

#[async_trait]
impl LockStore for MockLockStore {
    async fn try_acquire(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, CoordinationError> {
        let mut inner = self.lock();
        Self::check_available(&inner)?;
        purge_if_expired(&mut inner, key);

        if inner.locks.contains_key(key) {
            return Ok(false);
        }

        inner.locks.insert(
            key.to_string(),
            LockEntry {
                token: token.to_string(),
                expires_at: Instant::now() + ttl,
                ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, token: &str) -> Result<bool, CoordinationError> {
        let mut inner = self.lock();
        Self::check_available(&inner)?;
        purge_if_expired(&mut inner, key);

        let matches = inner.locks.get(key).is_some_and(|e| e.token == token);
        if matches {
            inner.locks.remove(key);
        }
        Ok(matches)
    }

    async fn force_release(&self, key: &str) -> Result<bool, CoordinationError> {
        let mut inner = self.lock();
        Self::check_available(&inner)?;
        purge_if_expired(&mut inner, key);
        Ok(inner.locks.remove(key).is_some())
    }

    async fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>, CoordinationError> {
        let mut inner = self.lock();
        Self::check_available(&inner)?;
        purge_if_expired(&mut inner, key);

        Ok(inner
            .locks
            .get(key)
            .map(|e| e.expires_at.saturating_duration_since(Instant::now())))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, CoordinationError> {
        let mut inner = self.lock();
        Self::check_available(&inner)?;

        let now = Instant::now();
        inner.locks.retain(|_, e| e.expires_at > now);

        let mut keys: Vec<String> = inner
            .locks
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_is_exclusive() {
        let store = MockLockStore::new();

        assert!(store
            .try_acquire("atrium:lock:x", "a", Duration::from_secs(5))
            .await
            .unwrap());
        assert!(!store
            .try_acquire("atrium:lock:x", "b", Duration::from_secs(5))
            .await
            .unwrap());
        assert_eq!(store.holder("atrium:lock:x"), Some("a".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expires() {
        let store = MockLockStore::new();

        assert!(store
            .try_acquire("atrium:lock:x", "a", Duration::from_secs(5))
            .await
            .unwrap());

        tokio::time::advance(Duration::from_secs(6)).await;

        assert!(store
            .try_acquire("atrium:lock:x", "b", Duration::from_secs(5))
            .await
            .unwrap());
        assert_eq!(store.holder("atrium:lock:x"), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_release_requires_matching_token() {
        let store = MockLockStore::new();

        store
            .try_acquire("atrium:lock:x", "a", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!store.release("atrium:lock:x", "b").await.unwrap());
        assert_eq!(store.holder("atrium:lock:x"), Some("a".to_string()));

        assert!(store.release("atrium:lock:x", "a").await.unwrap());
        assert_eq!(store.holder("atrium:lock:x"), None);
    }

    #[tokio::test]
    async fn test_outage_fails_closed() {
        let store = MockLockStore::new();
        store.set_unavailable(true);

        assert!(store
            .try_acquire("atrium:lock:x", "a", Duration::from_secs(5))
            .await
            .is_err());
        assert!(store.list_keys("atrium:lock:").await.is_err());

        store.set_unavailable(false);
        assert!(store
            .try_acquire("atrium:lock:x", "a", Duration::from_secs(5))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_keys_filters_prefix() {
        let store = MockLockStore::new();

        for key in [
            "atrium:lock:recording:r1",
            "atrium:lock:recording:r2",
            "atrium:lock:scheduled-task:room-gc",
        ] {
            store
                .try_acquire(key, "t", Duration::from_secs(5))
                .await
                .unwrap();
        }

        let keys = store.list_keys("atrium:lock:recording:").await.unwrap();
        assert_eq!(
            keys,
            vec!["atrium:lock:recording:r1", "atrium:lock:recording:r2"]
        );
    }
}
