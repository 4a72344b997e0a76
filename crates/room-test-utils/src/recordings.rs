//! In-memory recording repository.

use crate::lock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use room_service::errors::RoomServiceError;
use room_service::models::{RecordingRow, RecordingStatus};
use room_service::repositories::RecordingRepository;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory [`RecordingRepository`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordingRepository {
    inner: Arc<Mutex<HashMap<String, RecordingRow>>>,
}

impl InMemoryRecordingRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a recording row.
    #[must_use]
    pub fn with_recording(self, recording: RecordingRow) -> Self {
        self.insert(recording);
        self
    }

    pub fn insert(&self, recording: RecordingRow) {
        lock(&self.inner).insert(recording.recording_id.clone(), recording);
    }

    #[must_use]
    pub fn get(&self, recording_id: &str) -> Option<RecordingRow> {
        lock(&self.inner).get(recording_id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }
}

#[async_trait]
impl RecordingRepository for InMemoryRecordingRepository {
    async fn create(&self, recording: &RecordingRow) -> Result<(), RoomServiceError> {
        lock(&self.inner).insert(recording.recording_id.clone(), recording.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        recording_id: &str,
    ) -> Result<Option<RecordingRow>, RoomServiceError> {
        Ok(lock(&self.inner).get(recording_id).cloned())
    }

    async fn find_non_terminal_for_room(
        &self,
        room_id: &str,
    ) -> Result<Option<RecordingRow>, RoomServiceError> {
        let inner = lock(&self.inner);
        let mut candidates: Vec<&RecordingRow> = inner
            .values()
            .filter(|r| r.room_id == room_id && !r.status.is_terminal())
            .collect();
        candidates.sort_by_key(|r| r.started_at);
        Ok(candidates.last().map(|r| (*r).clone()))
    }

    async fn find_stale(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RecordingRow>, RoomServiceError> {
        let inner = lock(&self.inner);
        let mut stale: Vec<RecordingRow> = inner
            .values()
            .filter(|r| !r.status.is_terminal() && r.last_updated_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|r| r.last_updated_at);
        Ok(stale)
    }

    async fn update_status(
        &self,
        recording_id: &str,
        status: RecordingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RoomServiceError> {
        let mut inner = lock(&self.inner);
        match inner.get_mut(recording_id) {
            Some(recording) => {
                recording.status = status;
                recording.last_updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_room(&self, room_id: &str) -> Result<u64, RoomServiceError> {
        let mut inner = lock(&self.inner);
        let before = inner.len();
        inner.retain(|_, r| r.room_id != room_id);
        Ok((before - inner.len()) as u64)
    }
}
