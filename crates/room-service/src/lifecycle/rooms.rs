//! Room auto-deletion engine.
//!
//! A periodic sweep enforces each room's `auto_deletion_date`:
//!
//! - expired and empty: delete the room immediately (and, depending on the
//!   deletion policy, its recordings);
//! - expired but occupied: set `marked_for_deletion` and leave the room in
//!   place. Marked rooms are no longer swept; the media engine's
//!   "room became empty" signal deletes them reactively.
//!
//! Per-room failures are isolated: one bad room never aborts the rest of
//! the sweep. A room without an `auto_deletion_date` is never touched,
//! regardless of emptiness.

use crate::errors::RoomServiceError;
use crate::media::MediaEngine;
use crate::models::{DeletionPolicy, RoomRow};
use crate::observability::metrics;
use crate::repositories::{RecordingRepository, RoomRepository};
use chrono::{DateTime, Utc};
use coordination::TaskScheduler;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Scheduler task name for the periodic sweep.
pub const ROOM_GC_TASK: &str = "room-gc";

/// Room GC configuration.
#[derive(Debug, Clone)]
pub struct RoomGcConfig {
    /// Sweep cadence.
    pub sweep_interval: Duration,
    /// What room deletion takes with it.
    pub deletion_policy: DeletionPolicy,
    /// Minimum distance into the future for a newly accepted
    /// `auto_deletion_date`. Enforced at acceptance, not by the sweep.
    pub min_auto_deletion_lead: Duration,
}

/// Result of one sweep, for logs and metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: u64,
    pub deferred: u64,
    pub failed: u64,
}

enum SweepAction {
    Deleted,
    Deferred,
}

/// Room auto-deletion engine.
pub struct RoomLifecycle {
    rooms: Arc<dyn RoomRepository>,
    recordings: Arc<dyn RecordingRepository>,
    media: Arc<dyn MediaEngine>,
    config: RoomGcConfig,
}

impl RoomLifecycle {
    #[must_use]
    pub fn new(
        rooms: Arc<dyn RoomRepository>,
        recordings: Arc<dyn RecordingRepository>,
        media: Arc<dyn MediaEngine>,
        config: RoomGcConfig,
    ) -> Self {
        Self {
            rooms,
            recordings,
            media,
            config,
        }
    }

    /// Register the periodic sweep with the fleet scheduler.
    ///
    /// # Errors
    ///
    /// Propagates scheduler registration failures.
    pub fn register(
        engine: &Arc<Self>,
        scheduler: &TaskScheduler,
        run_immediately: bool,
    ) -> Result<(), RoomServiceError> {
        let sweep_interval = engine.config.sweep_interval;
        let engine = Arc::clone(engine);
        scheduler.register_cron(ROOM_GC_TASK, sweep_interval, run_immediately, move || {
            let engine = Arc::clone(&engine);
            Box::pin(async move {
                engine.sweep().await?;
                Ok(())
            })
        })?;
        Ok(())
    }

    /// One sweep over all expired, not-yet-deferred rooms.
    ///
    /// # Errors
    ///
    /// Fails only when the expired-room query itself fails; per-room
    /// processing errors are counted in the report and logged.
    #[instrument(skip_all, name = "room.gc.sweep")]
    pub async fn sweep(&self) -> Result<SweepReport, RoomServiceError> {
        let expired = self.rooms.find_expired(Utc::now()).await?;
        let mut report = SweepReport::default();

        for room in &expired {
            match self.process_expired_room(room).await {
                Ok(SweepAction::Deleted) => report.deleted += 1,
                Ok(SweepAction::Deferred) => report.deferred += 1,
                Err(e) => {
                    warn!(
                        target: "room.gc",
                        room_id = %room.room_id,
                        error = %e,
                        "Failed to process expired room, continuing sweep"
                    );
                    report.failed += 1;
                }
            }
        }

        if report != SweepReport::default() {
            info!(
                target: "room.gc",
                deleted = report.deleted,
                deferred = report.deferred,
                failed = report.failed,
                "Room GC sweep finished"
            );
        }
        metrics::record_room_sweep(report.deleted, report.deferred, report.failed);
        Ok(report)
    }

    async fn process_expired_room(&self, room: &RoomRow) -> Result<SweepAction, RoomServiceError> {
        let participants = self.media.participant_count(&room.room_id).await?;

        if participants == 0 {
            self.delete_room(&room.room_id).await?;
            Ok(SweepAction::Deleted)
        } else {
            self.rooms.mark_for_deletion(&room.room_id).await?;
            info!(
                target: "room.gc",
                room_id = %room.room_id,
                participants,
                "Room past its deletion date but occupied, deferring deletion"
            );
            Ok(SweepAction::Deferred)
        }
    }

    /// Reactive trigger: the media engine reported the room empty. A room
    /// deferred by an earlier sweep is deleted immediately; anything else
    /// is left alone. Returns whether a deletion happened.
    ///
    /// # Errors
    ///
    /// Propagates repository and media failures.
    #[instrument(skip_all, name = "room.gc.room_finished", fields(room_id = %room_id))]
    pub async fn handle_room_finished(&self, room_id: &str) -> Result<bool, RoomServiceError> {
        let Some(room) = self.rooms.find_by_id(room_id).await? else {
            return Ok(false);
        };

        if !room.marked_for_deletion {
            return Ok(false);
        }

        info!(
            target: "room.gc",
            room_id = %room_id,
            "Deferred room became empty, deleting"
        );
        self.delete_room(room_id).await?;
        Ok(true)
    }

    /// Accept an auto-deletion date for a room, enforcing the configured
    /// minimum lead time.
    ///
    /// # Errors
    ///
    /// `AutoDeletionTooSoon` below the floor; `RoomNotFound` for unknown
    /// rooms.
    pub async fn schedule_auto_deletion(
        &self,
        room_id: &str,
        date: DateTime<Utc>,
    ) -> Result<(), RoomServiceError> {
        self.validate_auto_deletion_date(date, Utc::now())?;
        self.rooms.set_auto_deletion_date(room_id, Some(date)).await
    }

    /// Pure floor check, split out for direct testing.
    ///
    /// # Errors
    ///
    /// `AutoDeletionTooSoon` when `date` is closer than the configured
    /// minimum lead.
    pub fn validate_auto_deletion_date(
        &self,
        date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RoomServiceError> {
        let min_lead = chrono::Duration::from_std(self.config.min_auto_deletion_lead)
            .unwrap_or_else(|_| chrono::Duration::seconds(0));

        if date < now + min_lead {
            return Err(RoomServiceError::AutoDeletionTooSoon {
                min_lead_secs: self.config.min_auto_deletion_lead.as_secs(),
            });
        }
        Ok(())
    }

    async fn delete_room(&self, room_id: &str) -> Result<(), RoomServiceError> {
        self.media.delete_room(room_id).await?;

        if self.config.deletion_policy == DeletionPolicy::WithRecordings {
            let removed = self.recordings.delete_by_room(room_id).await?;
            if removed > 0 {
                info!(
                    target: "room.gc",
                    room_id = %room_id,
                    recordings = removed,
                    "Deleted room recordings"
                );
            }
        }

        // false means another instance already deleted it; not an error
        let deleted = self.rooms.delete(room_id).await?;
        if deleted {
            info!(target: "room.gc", room_id = %room_id, "Room deleted");
        }
        Ok(())
    }
}
