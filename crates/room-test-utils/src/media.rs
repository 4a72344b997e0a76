//! Mock media engine.

use crate::lock;
use async_trait::async_trait;
use room_service::errors::RoomServiceError;
use room_service::media::MediaEngine;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// In-memory [`MediaEngine`] with controllable presence and failures.
#[derive(Debug, Clone, Default)]
pub struct MockMediaEngine {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    participants: HashMap<String, u32>,
    deleted_rooms: Vec<String>,
    started_recordings: Vec<String>,
    stopped_recordings: Vec<String>,
    /// Rooms whose presence check fails (sweep isolation tests).
    failing_rooms: HashSet<String>,
    reject_recording_start: bool,
}

impl MockMediaEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a room's live participant count.
    #[must_use]
    pub fn with_participants(self, room_id: &str, count: u32) -> Self {
        lock(&self.inner)
            .participants
            .insert(room_id.to_string(), count);
        self
    }

    /// Change a room's live participant count.
    pub fn set_participants(&self, room_id: &str, count: u32) {
        lock(&self.inner)
            .participants
            .insert(room_id.to_string(), count);
    }

    /// Make presence checks fail for one room.
    pub fn fail_room(&self, room_id: &str) {
        lock(&self.inner).failing_rooms.insert(room_id.to_string());
    }

    /// Make every recording start fail.
    pub fn set_reject_recording_start(&self, reject: bool) {
        lock(&self.inner).reject_recording_start = reject;
    }

    /// Rooms torn down via [`MediaEngine::delete_room`].
    #[must_use]
    pub fn deleted_rooms(&self) -> Vec<String> {
        lock(&self.inner).deleted_rooms.clone()
    }

    /// Rooms a recording start was issued for.
    #[must_use]
    pub fn started_recordings(&self) -> Vec<String> {
        lock(&self.inner).started_recordings.clone()
    }

    /// Recording IDs a stop was issued for.
    #[must_use]
    pub fn stopped_recordings(&self) -> Vec<String> {
        lock(&self.inner).stopped_recordings.clone()
    }
}

#[async_trait]
impl MediaEngine for MockMediaEngine {
    async fn participant_count(&self, room_id: &str) -> Result<u32, RoomServiceError> {
        let inner = lock(&self.inner);
        if inner.failing_rooms.contains(room_id) {
            return Err(RoomServiceError::Media(format!(
                "simulated presence failure for {room_id}"
            )));
        }
        Ok(inner.participants.get(room_id).copied().unwrap_or(0))
    }

    async fn delete_room(&self, room_id: &str) -> Result<(), RoomServiceError> {
        let mut inner = lock(&self.inner);
        inner.participants.remove(room_id);
        inner.deleted_rooms.push(room_id.to_string());
        Ok(())
    }

    async fn start_recording(&self, room_id: &str) -> Result<String, RoomServiceError> {
        let mut inner = lock(&self.inner);
        if inner.reject_recording_start {
            return Err(RoomServiceError::Media(
                "simulated recording start failure".to_string(),
            ));
        }
        inner.started_recordings.push(room_id.to_string());
        Ok(format!("egress-{room_id}"))
    }

    async fn stop_recording(
        &self,
        _room_id: &str,
        recording_id: &str,
    ) -> Result<(), RoomServiceError> {
        lock(&self.inner)
            .stopped_recordings
            .push(recording_id.to_string());
        Ok(())
    }
}
