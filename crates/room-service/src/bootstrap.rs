//! Fleet-safe global settings initialization.
//!
//! Every instance runs this at startup. Exactly one instance wins the
//! `global-config-init` lock and inserts the defaults; the others poll for
//! the winner's insert. If the store is unreachable the whole step fails
//! closed: an instance must not invent its own settings document.

use crate::errors::RoomServiceError;
use crate::models::GlobalSettings;
use crate::repositories::SettingsRepository;
use coordination::MutexService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lock name guarding first-time settings creation.
pub const CONFIG_INIT_LOCK: &str = "global-config-init";

/// Lock TTL: long enough for one insert, short enough that a crashed
/// winner does not stall the fleet's startup.
const CONFIG_INIT_LOCK_TTL: Duration = Duration::from_secs(30);

const WAIT_ATTEMPTS: u32 = 25;
const WAIT_BACKOFF: Duration = Duration::from_millis(200);

/// Return the global settings, creating them from `defaults` exactly once
/// across the fleet.
///
/// # Errors
///
/// Fails when the coordination store or repository is unreachable, or when
/// the lock holder never materializes a settings document within the wait
/// budget.
pub async fn ensure_global_settings(
    mutex: &MutexService,
    settings: &Arc<dyn SettingsRepository>,
    defaults: GlobalSettings,
) -> Result<GlobalSettings, RoomServiceError> {
    if let Some(existing) = settings.get().await? {
        return Ok(existing);
    }

    match mutex.acquire(CONFIG_INIT_LOCK, CONFIG_INIT_LOCK_TTL).await? {
        Some(guard) => {
            // Re-check under the lock: another instance may have finished
            // between our read and our acquire
            if let Some(existing) = settings.get().await? {
                release_quietly(mutex, &guard).await;
                return Ok(existing);
            }

            let inserted = settings.insert_default(&defaults).await?;
            if inserted {
                info!(
                    target: "room.bootstrap",
                    "Global settings initialized with defaults"
                );
            }
            release_quietly(mutex, &guard).await;
            Ok(defaults)
        }
        None => {
            // Another instance is initializing; wait for its insert
            for attempt in 1..=WAIT_ATTEMPTS {
                tokio::time::sleep(WAIT_BACKOFF).await;
                if let Some(existing) = settings.get().await? {
                    debug!(
                        target: "room.bootstrap",
                        attempt,
                        "Global settings initialized by another instance"
                    );
                    return Ok(existing);
                }
            }
            Err(RoomServiceError::Internal(
                "global settings were not initialized by the lock holder".to_string(),
            ))
        }
    }
}

async fn release_quietly(mutex: &MutexService, guard: &coordination::LockGuard) {
    if let Err(e) = mutex.release(guard).await {
        // The lease lapses on its own TTL; nothing to recover
        warn!(
            target: "room.bootstrap",
            error = %e,
            "Failed to release config-init lock"
        );
    }
}
