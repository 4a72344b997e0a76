//! Recording slot engine.
//!
//! Guarantees at most one non-terminal recording per room and detects
//! recordings that have stopped making progress.
//!
//! Three timers with very different horizons protect a recording:
//!
//! - the per-room slot lock TTL, sized generously for the expected total
//!   recording duration (the backstop);
//! - the stuck-start watchdog, a short one-shot timer that fails an
//!   attempt still in `Starting` and frees the slot for a retry;
//! - the staleness sweep, which aborts any non-terminal recording whose
//!   `last_updated_at` stopped moving (the fast path for hangs).
//!
//! A third sweep reconciles slot locks whose recording row is missing or
//! already terminal, after a grace period that avoids racing a start still
//! between lock acquisition and row creation.

use crate::errors::RoomServiceError;
use crate::media::MediaEngine;
use crate::models::{RecordingRow, RecordingStatus};
use crate::observability::metrics;
use crate::repositories::RecordingRepository;
use chrono::Utc;
use coordination::{lock_key, MutexService, TaskScheduler, LOCK_KEY_PREFIX};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Scheduler task name for the staleness sweep.
pub const RECORDING_STALENESS_TASK: &str = "recording-staleness";

/// Scheduler task name for the orphaned-lock sweep.
pub const RECORDING_LOCK_GC_TASK: &str = "recording-lock-gc";

/// Lock name for a room's recording slot.
#[must_use]
pub fn recording_lock_name(room_id: &str) -> String {
    format!("recording:{room_id}")
}

/// Recording lifecycle configuration.
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Slot lock TTL. Generous: expected total recording duration plus
    /// margin, because premature expiry would admit a second concurrent
    /// recording for the same room.
    pub lock_ttl: Duration,
    /// How long a recording may sit in `Starting` before the attempt is
    /// failed and its slot freed.
    pub start_timeout: Duration,
    /// No progress for this long marks a non-terminal recording stale.
    pub stale_threshold: Duration,
    /// Staleness sweep cadence.
    pub staleness_sweep_interval: Duration,
    /// Orphaned-lock sweep cadence.
    pub lock_gc_interval: Duration,
    /// Minimum lock age before the orphan sweep may reclaim it.
    pub lock_gc_grace: Duration,
}

/// Recording slot engine.
pub struct RecordingLifecycle {
    mutex: Arc<MutexService>,
    scheduler: TaskScheduler,
    recordings: Arc<dyn RecordingRepository>,
    media: Arc<dyn MediaEngine>,
    config: RecordingConfig,
}

impl RecordingLifecycle {
    #[must_use]
    pub fn new(
        mutex: Arc<MutexService>,
        scheduler: TaskScheduler,
        recordings: Arc<dyn RecordingRepository>,
        media: Arc<dyn MediaEngine>,
        config: RecordingConfig,
    ) -> Self {
        Self {
            mutex,
            scheduler,
            recordings,
            media,
            config,
        }
    }

    /// Register the staleness and orphaned-lock sweeps with the fleet
    /// scheduler.
    ///
    /// # Errors
    ///
    /// Propagates scheduler registration failures.
    pub fn register(engine: &Arc<Self>, run_immediately: bool) -> Result<(), RoomServiceError> {
        let staleness_engine = Arc::clone(engine);
        engine.scheduler.register_cron(
            RECORDING_STALENESS_TASK,
            engine.config.staleness_sweep_interval,
            run_immediately,
            move || {
                let engine = Arc::clone(&staleness_engine);
                Box::pin(async move {
                    engine.staleness_sweep().await?;
                    Ok(())
                })
            },
        )?;

        let lock_gc_engine = Arc::clone(engine);
        engine.scheduler.register_cron(
            RECORDING_LOCK_GC_TASK,
            engine.config.lock_gc_interval,
            run_immediately,
            move || {
                let engine = Arc::clone(&lock_gc_engine);
                Box::pin(async move {
                    engine.lock_gc_sweep().await?;
                    Ok(())
                })
            },
        )?;

        Ok(())
    }

    /// Start a recording for a room.
    ///
    /// Takes the per-room slot lock before instructing the media engine;
    /// if the slot is held, the start is rejected with
    /// [`RoomServiceError::RecordingAlreadyInProgress`]. On a successful
    /// start, a one-shot watchdog is scheduled that fails the attempt if
    /// it never leaves `Starting`.
    ///
    /// # Errors
    ///
    /// `RecordingAlreadyInProgress` on slot contention; store, repository
    /// and media failures otherwise (the slot is freed again on those).
    #[instrument(skip_all, name = "recording.start", fields(room_id = %room_id))]
    pub async fn start_recording(&self, room_id: &str) -> Result<RecordingRow, RoomServiceError> {
        let guard = self
            .mutex
            .acquire(&recording_lock_name(room_id), self.config.lock_ttl)
            .await?
            .ok_or_else(|| RoomServiceError::RecordingAlreadyInProgress(room_id.to_string()))?;

        let now = Utc::now();
        let recording = RecordingRow {
            recording_id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            status: RecordingStatus::Starting,
            started_at: now,
            last_updated_at: now,
        };

        if let Err(e) = self.recordings.create(&recording).await {
            if let Err(release_err) = self.mutex.release(&guard).await {
                warn!(
                    target: "room.recording",
                    room_id = %room_id,
                    error = %release_err,
                    "Failed to release slot after create failure, lease will lapse"
                );
            }
            return Err(e);
        }

        if let Err(e) = self.media.start_recording(room_id).await {
            warn!(
                target: "room.recording",
                room_id = %room_id,
                error = %e,
                "Media engine rejected recording start"
            );
            if let Err(db_err) = self
                .recordings
                .update_status(&recording.recording_id, RecordingStatus::Failed, Utc::now())
                .await
            {
                warn!(
                    target: "room.recording",
                    recording_id = %recording.recording_id,
                    error = %db_err,
                    "Failed to mark rejected recording as failed"
                );
            }
            if let Err(release_err) = self.mutex.release(&guard).await {
                warn!(
                    target: "room.recording",
                    room_id = %room_id,
                    error = %release_err,
                    "Failed to release slot after start failure, lease will lapse"
                );
            }
            return Err(e);
        }

        self.register_start_watchdog(&recording, guard.clone());

        info!(
            target: "room.recording",
            room_id = %room_id,
            recording_id = %recording.recording_id,
            "Recording start requested"
        );
        Ok(recording)
    }

    /// One-shot watchdog: if the recording is still `Starting` when the
    /// start timeout elapses, fail the attempt and free the slot so a
    /// retry can occur. Much shorter horizon than the slot lock TTL.
    fn register_start_watchdog(&self, recording: &RecordingRow, guard: coordination::LockGuard) {
        // Keyed by attempt, not room: back-to-back attempts in one room
        // must each get their own watchdog
        let name = format!("recording-start-watchdog:{}", recording.recording_id);
        let recordings = Arc::clone(&self.recordings);
        let mutex = self.mutex.clone();
        let recording_id = recording.recording_id.clone();
        let room_id = recording.room_id.clone();

        let registered = self
            .scheduler
            .register_timeout(&name, self.config.start_timeout, move || {
                let recordings = Arc::clone(&recordings);
                let mutex = mutex.clone();
                let recording_id = recording_id.clone();
                let room_id = room_id.clone();
                let guard = guard.clone();
                Box::pin(async move {
                    let Some(current) = recordings.find_by_id(&recording_id).await? else {
                        return Ok(());
                    };
                    if current.status != RecordingStatus::Starting {
                        return Ok(());
                    }

                    warn!(
                        target: "room.recording",
                        room_id = %room_id,
                        recording_id = %recording_id,
                        "Recording never left starting state, failing attempt"
                    );
                    recordings
                        .update_status(&recording_id, RecordingStatus::Failed, Utc::now())
                        .await?;
                    mutex.release(&guard).await?;
                    metrics::record_recording_cleanup("stuck_start", 1);
                    Ok(())
                })
            });

        if let Err(e) = registered {
            warn!(
                target: "room.recording",
                room_id = %recording.room_id,
                error = %e,
                "Failed to schedule start watchdog"
            );
        }
    }

    /// Apply a status transition observed from the media engine (webhook
    /// layer calls this). Refreshes `last_updated_at`; a terminal state
    /// frees the room's slot.
    ///
    /// The slot is force-released rather than token-released: the instance
    /// observing the terminal transition is rarely the one that acquired
    /// the lock.
    ///
    /// # Errors
    ///
    /// `RecordingNotFound` for unknown recordings; store and repository
    /// failures otherwise.
    #[instrument(skip_all, name = "recording.status_update", fields(recording_id = %recording_id, status = status.as_str()))]
    pub async fn handle_status_update(
        &self,
        recording_id: &str,
        status: RecordingStatus,
    ) -> Result<(), RoomServiceError> {
        let Some(recording) = self.recordings.find_by_id(recording_id).await? else {
            return Err(RoomServiceError::RecordingNotFound(
                recording_id.to_string(),
            ));
        };

        self.recordings
            .update_status(recording_id, status, Utc::now())
            .await?;

        if status.is_terminal() {
            self.mutex
                .store()
                .force_release(&lock_key(&recording_lock_name(&recording.room_id)))
                .await?;
            info!(
                target: "room.recording",
                room_id = %recording.room_id,
                recording_id = %recording_id,
                status = status.as_str(),
                "Recording reached terminal state, slot freed"
            );
        }

        Ok(())
    }

    /// Request a stop for a room's current recording.
    ///
    /// # Errors
    ///
    /// `RecordingNotFound` when the room has no non-terminal recording.
    #[instrument(skip_all, name = "recording.stop", fields(room_id = %room_id))]
    pub async fn stop_recording(&self, room_id: &str) -> Result<RecordingRow, RoomServiceError> {
        let Some(recording) = self.recordings.find_non_terminal_for_room(room_id).await? else {
            return Err(RoomServiceError::RecordingNotFound(room_id.to_string()));
        };

        self.media
            .stop_recording(room_id, &recording.recording_id)
            .await?;
        self.recordings
            .update_status(&recording.recording_id, RecordingStatus::Ending, Utc::now())
            .await?;

        Ok(recording)
    }

    /// Abort every non-terminal recording with no progress inside the
    /// stale threshold, freeing its slot. Returns the number cleaned.
    ///
    /// # Errors
    ///
    /// Fails only when the stale query itself fails; per-recording errors
    /// are logged and skipped.
    #[instrument(skip_all, name = "recording.staleness_sweep")]
    pub async fn staleness_sweep(&self) -> Result<u64, RoomServiceError> {
        let threshold = chrono::Duration::from_std(self.config.stale_threshold)
            .unwrap_or_else(|_| chrono::Duration::seconds(0));
        let cutoff = Utc::now() - threshold;

        let stale = self.recordings.find_stale(cutoff).await?;
        let mut cleaned = 0;

        for recording in stale {
            warn!(
                target: "room.recording",
                room_id = %recording.room_id,
                recording_id = %recording.recording_id,
                status = recording.status.as_str(),
                last_updated_at = %recording.last_updated_at,
                "Recording made no progress inside the stale threshold, aborting"
            );

            if let Err(e) = self.force_abort(&recording).await {
                warn!(
                    target: "room.recording",
                    recording_id = %recording.recording_id,
                    error = %e,
                    "Failed to abort stale recording, continuing sweep"
                );
            } else {
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            metrics::record_recording_cleanup("stale", cleaned);
        }
        Ok(cleaned)
    }

    async fn force_abort(&self, recording: &RecordingRow) -> Result<(), RoomServiceError> {
        self.recordings
            .update_status(&recording.recording_id, RecordingStatus::Aborted, Utc::now())
            .await?;
        self.mutex
            .store()
            .force_release(&lock_key(&recording_lock_name(&recording.room_id)))
            .await?;
        Ok(())
    }

    /// Release slot locks whose recording row no longer exists or is
    /// already terminal. Locks younger than the grace period are left
    /// alone: a start may still be in its brief window between lock
    /// acquisition and row creation. Returns the number released.
    ///
    /// # Errors
    ///
    /// Fails only when the key enumeration itself fails; per-key errors
    /// are logged and skipped.
    #[instrument(skip_all, name = "recording.lock_gc_sweep")]
    pub async fn lock_gc_sweep(&self) -> Result<u64, RoomServiceError> {
        let prefix = format!("{LOCK_KEY_PREFIX}recording:");
        let keys = self.mutex.store().list_keys(&prefix).await?;
        let mut released = 0;

        for key in keys {
            let Some(room_id) = key.strip_prefix(&prefix) else {
                continue;
            };

            match self.reclaim_orphaned_lock(&key, room_id).await {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        target: "room.recording",
                        key = %key,
                        error = %e,
                        "Failed to reconcile recording lock, continuing sweep"
                    );
                }
            }
        }

        if released > 0 {
            metrics::record_recording_cleanup("orphaned_lock", released);
        }
        Ok(released)
    }

    async fn reclaim_orphaned_lock(
        &self,
        key: &str,
        room_id: &str,
    ) -> Result<bool, RoomServiceError> {
        let Some(remaining) = self.mutex.store().remaining_ttl(key).await? else {
            // Lease lapsed between enumeration and inspection
            return Ok(false);
        };

        let age = self.config.lock_ttl.saturating_sub(remaining);
        if age < self.config.lock_gc_grace {
            return Ok(false);
        }

        if self
            .recordings
            .find_non_terminal_for_room(room_id)
            .await?
            .is_some()
        {
            return Ok(false);
        }

        info!(
            target: "room.recording",
            room_id = %room_id,
            "Releasing orphaned recording lock"
        );
        self.mutex.store().force_release(key).await
            .map_err(RoomServiceError::from)
    }
}
