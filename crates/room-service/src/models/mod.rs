//! Persisted entities the lifecycle engines read and write.
//!
//! Only the lifecycle-relevant subset of each entity is modeled here; the
//! wider room/recording documents belong to the API layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle-relevant subset of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRow {
    pub room_id: String,
    pub name: String,
    /// When set, the room becomes eligible for deletion once this instant
    /// passes and no participants are present. A room without a deletion
    /// date is never touched by the GC engine.
    pub auto_deletion_date: Option<DateTime<Utc>>,
    /// Set once the deletion date passed but deletion was deferred because
    /// participants were still present; such rooms are deleted reactively
    /// when the media engine reports them empty.
    pub marked_for_deletion: bool,
    pub created_at: DateTime<Utc>,
}

/// Recording slot state machine.
///
/// `Starting -> Active -> Ending -> Complete` is the happy path; `Failed`
/// and `Aborted` are terminal failure states (start never succeeded /
/// forced by the staleness sweep).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Starting,
    Active,
    Ending,
    Complete,
    Failed,
    Aborted,
}

impl RecordingStatus {
    /// Terminal states free the room's recording slot.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RecordingStatus::Complete | RecordingStatus::Failed | RecordingStatus::Aborted
        )
    }

    /// Stable string form used in the database and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecordingStatus::Starting => "starting",
            RecordingStatus::Active => "active",
            RecordingStatus::Ending => "ending",
            RecordingStatus::Complete => "complete",
            RecordingStatus::Failed => "failed",
            RecordingStatus::Aborted => "aborted",
        }
    }

    /// Parse the database string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "starting" => Some(RecordingStatus::Starting),
            "active" => Some(RecordingStatus::Active),
            "ending" => Some(RecordingStatus::Ending),
            "complete" => Some(RecordingStatus::Complete),
            "failed" => Some(RecordingStatus::Failed),
            "aborted" => Some(RecordingStatus::Aborted),
            _ => None,
        }
    }
}

/// Lifecycle-relevant subset of a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingRow {
    pub recording_id: String,
    pub room_id: String,
    pub status: RecordingStatus,
    pub started_at: DateTime<Utc>,
    /// Refreshed on every observed state transition; drives staleness
    /// detection independently of the slot lock's own TTL.
    pub last_updated_at: DateTime<Utc>,
}

/// What room deletion takes with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Delete the room document only; recordings remain accessible.
    RoomOnly,
    /// Delete the room and its recordings together.
    WithRecordings,
}

impl DeletionPolicy {
    /// Parse the configuration string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "room-only" => Some(DeletionPolicy::RoomOnly),
            "with-recordings" => Some(DeletionPolicy::WithRecordings),
            _ => None,
        }
    }
}

/// Fleet-wide settings document, created exactly once by whichever
/// instance wins the `global-config-init` lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub recordings_enabled: bool,
    pub webhooks_enabled: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            recordings_enabled: true,
            webhooks_enabled: false,
        }
    }
}
