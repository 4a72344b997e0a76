//! Rooms repository for database operations.
//!
//! All queries use parameterized statements. Expiry filtering happens in
//! SQL so a sweep never sees rooms without an `auto_deletion_date`.

use crate::errors::RoomServiceError;
use crate::models::RoomRow;
use crate::observability::metrics;
use crate::repositories::RoomRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

/// Postgres-backed [`RoomRepository`].
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    #[instrument(skip_all, name = "room.repo.find_by_id", fields(room_id = %room_id))]
    async fn find_by_id(&self, room_id: &str) -> Result<Option<RoomRow>, RoomServiceError> {
        let start = Instant::now();

        let row = sqlx::query(
            r"
            SELECT room_id, name, auto_deletion_date, marked_for_deletion, created_at
            FROM rooms
            WHERE room_id = $1
            ",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("find_room", "error", start.elapsed());
            RoomServiceError::Database(e.to_string())
        })?;

        metrics::record_db_query("find_room", "success", start.elapsed());
        row.map(|r| map_row_to_room(&r)).transpose()
    }

    #[instrument(skip_all, name = "room.repo.find_expired")]
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<RoomRow>, RoomServiceError> {
        let start = Instant::now();

        let rows = sqlx::query(
            r"
            SELECT room_id, name, auto_deletion_date, marked_for_deletion, created_at
            FROM rooms
            WHERE auto_deletion_date IS NOT NULL
              AND auto_deletion_date <= $1
              AND marked_for_deletion = false
            ORDER BY auto_deletion_date
            ",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("find_expired_rooms", "error", start.elapsed());
            RoomServiceError::Database(e.to_string())
        })?;

        metrics::record_db_query("find_expired_rooms", "success", start.elapsed());
        rows.iter().map(map_row_to_room).collect()
    }

    #[instrument(skip_all, name = "room.repo.set_auto_deletion_date", fields(room_id = %room_id))]
    async fn set_auto_deletion_date(
        &self,
        room_id: &str,
        date: Option<DateTime<Utc>>,
    ) -> Result<(), RoomServiceError> {
        let start = Instant::now();

        let result = sqlx::query(
            r"
            UPDATE rooms
            SET auto_deletion_date = $2, marked_for_deletion = false
            WHERE room_id = $1
            ",
        )
        .bind(room_id)
        .bind(date)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("set_auto_deletion_date", "error", start.elapsed());
            RoomServiceError::Database(e.to_string())
        })?;

        metrics::record_db_query("set_auto_deletion_date", "success", start.elapsed());
        if result.rows_affected() == 0 {
            return Err(RoomServiceError::RoomNotFound(room_id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip_all, name = "room.repo.mark_for_deletion", fields(room_id = %room_id))]
    async fn mark_for_deletion(&self, room_id: &str) -> Result<(), RoomServiceError> {
        let start = Instant::now();

        sqlx::query(
            r"
            UPDATE rooms
            SET marked_for_deletion = true
            WHERE room_id = $1
            ",
        )
        .bind(room_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("mark_room_for_deletion", "error", start.elapsed());
            RoomServiceError::Database(e.to_string())
        })?;

        metrics::record_db_query("mark_room_for_deletion", "success", start.elapsed());
        Ok(())
    }

    #[instrument(skip_all, name = "room.repo.delete", fields(room_id = %room_id))]
    async fn delete(&self, room_id: &str) -> Result<bool, RoomServiceError> {
        let start = Instant::now();

        let result = sqlx::query(
            r"
            DELETE FROM rooms
            WHERE room_id = $1
            ",
        )
        .bind(room_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("delete_room", "error", start.elapsed());
            RoomServiceError::Database(e.to_string())
        })?;

        metrics::record_db_query("delete_room", "success", start.elapsed());
        Ok(result.rows_affected() > 0)
    }
}

fn map_row_to_room(row: &sqlx::postgres::PgRow) -> Result<RoomRow, RoomServiceError> {
    Ok(RoomRow {
        room_id: row
            .try_get("room_id")
            .map_err(|e| RoomServiceError::Database(e.to_string()))?,
        name: row
            .try_get("name")
            .map_err(|e| RoomServiceError::Database(e.to_string()))?,
        auto_deletion_date: row
            .try_get("auto_deletion_date")
            .map_err(|e| RoomServiceError::Database(e.to_string()))?,
        marked_for_deletion: row
            .try_get("marked_for_deletion")
            .map_err(|e| RoomServiceError::Database(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| RoomServiceError::Database(e.to_string()))?,
    })
}
