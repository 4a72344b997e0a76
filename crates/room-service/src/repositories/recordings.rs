//! Recordings repository for database operations.
//!
//! Status values are stored in their stable string form (see
//! [`RecordingStatus::as_str`]); an unknown value in the database is a
//! data error, surfaced as `RoomServiceError::Database`.

use crate::errors::RoomServiceError;
use crate::models::{RecordingRow, RecordingStatus};
use crate::observability::metrics;
use crate::repositories::RecordingRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

const NON_TERMINAL_STATUSES: [&str; 3] = ["starting", "active", "ending"];

/// Postgres-backed [`RecordingRepository`].
pub struct PgRecordingRepository {
    pool: PgPool,
}

impl PgRecordingRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordingRepository for PgRecordingRepository {
    #[instrument(skip_all, name = "recording.repo.create", fields(recording_id = %recording.recording_id))]
    async fn create(&self, recording: &RecordingRow) -> Result<(), RoomServiceError> {
        let start = Instant::now();

        sqlx::query(
            r"
            INSERT INTO recordings (recording_id, room_id, status, started_at, last_updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&recording.recording_id)
        .bind(&recording.room_id)
        .bind(recording.status.as_str())
        .bind(recording.started_at)
        .bind(recording.last_updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("create_recording", "error", start.elapsed());
            RoomServiceError::Database(e.to_string())
        })?;

        metrics::record_db_query("create_recording", "success", start.elapsed());
        Ok(())
    }

    #[instrument(skip_all, name = "recording.repo.find_by_id", fields(recording_id = %recording_id))]
    async fn find_by_id(
        &self,
        recording_id: &str,
    ) -> Result<Option<RecordingRow>, RoomServiceError> {
        let start = Instant::now();

        let row = sqlx::query(
            r"
            SELECT recording_id, room_id, status, started_at, last_updated_at
            FROM recordings
            WHERE recording_id = $1
            ",
        )
        .bind(recording_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("find_recording", "error", start.elapsed());
            RoomServiceError::Database(e.to_string())
        })?;

        metrics::record_db_query("find_recording", "success", start.elapsed());
        row.map(|r| map_row_to_recording(&r)).transpose()
    }

    #[instrument(skip_all, name = "recording.repo.find_non_terminal", fields(room_id = %room_id))]
    async fn find_non_terminal_for_room(
        &self,
        room_id: &str,
    ) -> Result<Option<RecordingRow>, RoomServiceError> {
        let start = Instant::now();

        let row = sqlx::query(
            r"
            SELECT recording_id, room_id, status, started_at, last_updated_at
            FROM recordings
            WHERE room_id = $1 AND status = ANY($2)
            ORDER BY started_at DESC
            LIMIT 1
            ",
        )
        .bind(room_id)
        .bind(NON_TERMINAL_STATUSES.as_slice())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("find_non_terminal_recording", "error", start.elapsed());
            RoomServiceError::Database(e.to_string())
        })?;

        metrics::record_db_query("find_non_terminal_recording", "success", start.elapsed());
        row.map(|r| map_row_to_recording(&r)).transpose()
    }

    #[instrument(skip_all, name = "recording.repo.find_stale")]
    async fn find_stale(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RecordingRow>, RoomServiceError> {
        let start = Instant::now();

        let rows = sqlx::query(
            r"
            SELECT recording_id, room_id, status, started_at, last_updated_at
            FROM recordings
            WHERE status = ANY($1) AND last_updated_at < $2
            ORDER BY last_updated_at
            ",
        )
        .bind(NON_TERMINAL_STATUSES.as_slice())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("find_stale_recordings", "error", start.elapsed());
            RoomServiceError::Database(e.to_string())
        })?;

        metrics::record_db_query("find_stale_recordings", "success", start.elapsed());
        rows.iter().map(map_row_to_recording).collect()
    }

    #[instrument(skip_all, name = "recording.repo.update_status", fields(recording_id = %recording_id, status = status.as_str()))]
    async fn update_status(
        &self,
        recording_id: &str,
        status: RecordingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RoomServiceError> {
        let start = Instant::now();

        let result = sqlx::query(
            r"
            UPDATE recordings
            SET status = $2, last_updated_at = $3
            WHERE recording_id = $1
            ",
        )
        .bind(recording_id)
        .bind(status.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("update_recording_status", "error", start.elapsed());
            RoomServiceError::Database(e.to_string())
        })?;

        metrics::record_db_query("update_recording_status", "success", start.elapsed());
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip_all, name = "recording.repo.delete_by_room", fields(room_id = %room_id))]
    async fn delete_by_room(&self, room_id: &str) -> Result<u64, RoomServiceError> {
        let start = Instant::now();

        let result = sqlx::query(
            r"
            DELETE FROM recordings
            WHERE room_id = $1
            ",
        )
        .bind(room_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("delete_recordings_by_room", "error", start.elapsed());
            RoomServiceError::Database(e.to_string())
        })?;

        metrics::record_db_query("delete_recordings_by_room", "success", start.elapsed());
        Ok(result.rows_affected())
    }
}

fn map_row_to_recording(row: &sqlx::postgres::PgRow) -> Result<RecordingRow, RoomServiceError> {
    let status_str: String = row
        .try_get("status")
        .map_err(|e| RoomServiceError::Database(e.to_string()))?;
    let status = RecordingStatus::parse(&status_str).ok_or_else(|| {
        RoomServiceError::Database(format!("unknown recording status '{status_str}'"))
    })?;

    Ok(RecordingRow {
        recording_id: row
            .try_get("recording_id")
            .map_err(|e| RoomServiceError::Database(e.to_string()))?,
        room_id: row
            .try_get("room_id")
            .map_err(|e| RoomServiceError::Database(e.to_string()))?,
        status,
        started_at: row
            .try_get("started_at")
            .map_err(|e| RoomServiceError::Database(e.to_string()))?,
        last_updated_at: row
            .try_get("last_updated_at")
            .map_err(|e| RoomServiceError::Database(e.to_string()))?,
    })
}
