//! In-memory room repository.

use crate::lock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use room_service::errors::RoomServiceError;
use room_service::models::RoomRow;
use room_service::repositories::RoomRepository;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory [`RoomRepository`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoomRepository {
    inner: Arc<Mutex<HashMap<String, RoomRow>>>,
}

impl InMemoryRoomRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a room with the given deletion date.
    #[must_use]
    pub fn with_room(self, room_id: &str, auto_deletion_date: Option<DateTime<Utc>>) -> Self {
        self.insert(make_room(room_id, auto_deletion_date));
        self
    }

    pub fn insert(&self, room: RoomRow) {
        lock(&self.inner).insert(room.room_id.clone(), room);
    }

    #[must_use]
    pub fn contains(&self, room_id: &str) -> bool {
        lock(&self.inner).contains_key(room_id)
    }

    #[must_use]
    pub fn get(&self, room_id: &str) -> Option<RoomRow> {
        lock(&self.inner).get(room_id).cloned()
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

/// Build a room row for tests.
#[must_use]
pub fn make_room(room_id: &str, auto_deletion_date: Option<DateTime<Utc>>) -> RoomRow {
    RoomRow {
        room_id: room_id.to_string(),
        name: format!("Room {room_id}"),
        auto_deletion_date,
        marked_for_deletion: false,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn find_by_id(&self, room_id: &str) -> Result<Option<RoomRow>, RoomServiceError> {
        Ok(lock(&self.inner).get(room_id).cloned())
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<RoomRow>, RoomServiceError> {
        let inner = lock(&self.inner);
        let mut expired: Vec<RoomRow> = inner
            .values()
            .filter(|room| {
                !room.marked_for_deletion
                    && room.auto_deletion_date.is_some_and(|date| date <= now)
            })
            .cloned()
            .collect();
        expired.sort_by_key(|room| room.auto_deletion_date);
        Ok(expired)
    }

    async fn set_auto_deletion_date(
        &self,
        room_id: &str,
        date: Option<DateTime<Utc>>,
    ) -> Result<(), RoomServiceError> {
        let mut inner = lock(&self.inner);
        let room = inner
            .get_mut(room_id)
            .ok_or_else(|| RoomServiceError::RoomNotFound(room_id.to_string()))?;
        room.auto_deletion_date = date;
        room.marked_for_deletion = false;
        Ok(())
    }

    async fn mark_for_deletion(&self, room_id: &str) -> Result<(), RoomServiceError> {
        if let Some(room) = lock(&self.inner).get_mut(room_id) {
            room.marked_for_deletion = true;
        }
        Ok(())
    }

    async fn delete(&self, room_id: &str) -> Result<bool, RoomServiceError> {
        Ok(lock(&self.inner).remove(room_id).is_some())
    }
}
