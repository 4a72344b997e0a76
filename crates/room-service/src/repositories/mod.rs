//! Persistence collaborators.
//!
//! The lifecycle engines never talk to physical storage directly: they
//! depend on these traits, and tests substitute in-memory fakes. The
//! Postgres implementations own all SQL.

pub mod recordings;
pub mod rooms;
pub mod settings;

use crate::errors::RoomServiceError;
use crate::models::{GlobalSettings, RecordingRow, RecordingStatus, RoomRow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use recordings::PgRecordingRepository;
pub use rooms::PgRoomRepository;
pub use settings::PgSettingsRepository;

/// Read/update of the lifecycle-relevant room fields.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn find_by_id(&self, room_id: &str) -> Result<Option<RoomRow>, RoomServiceError>;

    /// Rooms whose `auto_deletion_date` has passed and that are not yet
    /// deferred (`marked_for_deletion = false`). Rooms without a deletion
    /// date are never returned.
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<RoomRow>, RoomServiceError>;

    async fn set_auto_deletion_date(
        &self,
        room_id: &str,
        date: Option<DateTime<Utc>>,
    ) -> Result<(), RoomServiceError>;

    /// Idempotent: marking an already-marked room succeeds.
    async fn mark_for_deletion(&self, room_id: &str) -> Result<(), RoomServiceError>;

    /// Returns `true` if a room was removed, `false` if it was already
    /// gone (sweeps may race; double deletion is not an error).
    async fn delete(&self, room_id: &str) -> Result<bool, RoomServiceError>;
}

/// Read/update of recording status and progress timestamps.
#[async_trait]
pub trait RecordingRepository: Send + Sync {
    async fn create(&self, recording: &RecordingRow) -> Result<(), RoomServiceError>;

    async fn find_by_id(
        &self,
        recording_id: &str,
    ) -> Result<Option<RecordingRow>, RoomServiceError>;

    /// The room's current non-terminal recording, if any. At most one
    /// exists per room (enforced by the per-room slot lock).
    async fn find_non_terminal_for_room(
        &self,
        room_id: &str,
    ) -> Result<Option<RecordingRow>, RoomServiceError>;

    /// Non-terminal recordings whose `last_updated_at` is older than
    /// `cutoff`.
    async fn find_stale(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RecordingRow>, RoomServiceError>;

    /// Transition a recording and refresh `last_updated_at`. Returns
    /// `false` if the recording does not exist.
    async fn update_status(
        &self,
        recording_id: &str,
        status: RecordingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RoomServiceError>;

    /// Remove all recordings of a room; returns the number removed.
    async fn delete_by_room(&self, room_id: &str) -> Result<u64, RoomServiceError>;
}

/// Read/initialize the fleet-wide settings document.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self) -> Result<Option<GlobalSettings>, RoomServiceError>;

    /// Insert the defaults if no settings document exists yet. Returns
    /// `false` if one was already present (another instance won the
    /// initialization race).
    async fn insert_default(&self, defaults: &GlobalSettings) -> Result<bool, RoomServiceError>;
}
