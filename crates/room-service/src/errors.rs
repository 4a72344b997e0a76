//! Room service error types.
//!
//! Contention on the per-room recording slot has its own variant so the
//! HTTP layer can answer "a recording is already in progress" distinctly
//! from a generic failure. Internal details (connection strings, SQL) are
//! logged server-side and never embedded in client-facing messages.

use coordination::CoordinationError;
use thiserror::Error;

/// Room service error type.
#[derive(Debug, Error)]
pub enum RoomServiceError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Media engine call failed.
    #[error("Media engine error: {0}")]
    Media(String),

    /// Coordination store failure (locks unavailable, fail closed).
    #[error("Coordination error: {0}")]
    Coordination(#[from] CoordinationError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Room not found.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Recording not found.
    #[error("Recording not found: {0}")]
    RecordingNotFound(String),

    /// A non-terminal recording already holds the room's slot.
    #[error("Recording already in progress for room {0}")]
    RecordingAlreadyInProgress(String),

    /// Requested auto-deletion date is below the configured floor.
    #[error("Auto-deletion date must be at least {min_lead_secs}s in the future")]
    AutoDeletionTooSoon { min_lead_secs: u64 },

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoomServiceError {
    /// Whether this error reflects resource contention rather than a
    /// fault. Contention outcomes are expected under fleet operation and
    /// must not be alerted on.
    #[must_use]
    pub fn is_contention(&self) -> bool {
        matches!(self, RoomServiceError::RecordingAlreadyInProgress(_))
    }

    /// Client-safe message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            RoomServiceError::Database(_)
            | RoomServiceError::Coordination(_)
            | RoomServiceError::Config(_)
            | RoomServiceError::Media(_)
            | RoomServiceError::Internal(_) => "An internal error occurred".to_string(),
            RoomServiceError::RoomNotFound(_) => "Room not found".to_string(),
            RoomServiceError::RecordingNotFound(_) => "Recording not found".to_string(),
            RoomServiceError::RecordingAlreadyInProgress(_) => {
                "A recording is already in progress for this room".to_string()
            }
            RoomServiceError::AutoDeletionTooSoon { .. } => self.to_string(),
        }
    }
}
