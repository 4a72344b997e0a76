//! Media engine collaborator.
//!
//! The engines call into the media layer after winning the relevant lock;
//! the media layer pushes back one signal ("room became empty") which the
//! webhook layer forwards to
//! [`crate::lifecycle::rooms::RoomLifecycle::handle_room_finished`].

use crate::errors::RoomServiceError;
use async_trait::async_trait;

/// Presence queries, room teardown and recording primitives.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Live participant count of a room. A room unknown to the media
    /// engine counts as empty.
    async fn participant_count(&self, room_id: &str) -> Result<u32, RoomServiceError>;

    /// Tear down the room's session: kick remaining participants and drop
    /// server-side state. Idempotent for rooms the engine no longer knows.
    async fn delete_room(&self, room_id: &str) -> Result<(), RoomServiceError>;

    /// Begin a recording for the room. Returns the engine-side egress
    /// identifier.
    async fn start_recording(&self, room_id: &str) -> Result<String, RoomServiceError>;

    /// Stop the room's recording.
    async fn stop_recording(&self, room_id: &str, recording_id: &str)
        -> Result<(), RoomServiceError>;
}
