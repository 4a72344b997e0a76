//! Global settings repository.
//!
//! A single-row table (`id = true` unique) holds the fleet-wide settings
//! document. `insert_default` relies on `ON CONFLICT DO NOTHING` so two
//! racing initializers cannot both insert.

use crate::errors::RoomServiceError;
use crate::models::GlobalSettings;
use crate::observability::metrics;
use crate::repositories::SettingsRepository;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

/// Postgres-backed [`SettingsRepository`].
pub struct PgSettingsRepository {
    pool: PgPool,
}

impl PgSettingsRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for PgSettingsRepository {
    #[instrument(skip_all, name = "settings.repo.get")]
    async fn get(&self) -> Result<Option<GlobalSettings>, RoomServiceError> {
        let start = Instant::now();

        let row = sqlx::query(
            r"
            SELECT recordings_enabled, webhooks_enabled
            FROM global_settings
            WHERE id = true
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("get_settings", "error", start.elapsed());
            RoomServiceError::Database(e.to_string())
        })?;

        metrics::record_db_query("get_settings", "success", start.elapsed());

        match row {
            Some(row) => Ok(Some(GlobalSettings {
                recordings_enabled: row
                    .try_get("recordings_enabled")
                    .map_err(|e| RoomServiceError::Database(e.to_string()))?,
                webhooks_enabled: row
                    .try_get("webhooks_enabled")
                    .map_err(|e| RoomServiceError::Database(e.to_string()))?,
            })),
            None => Ok(None),
        }
    }

    #[instrument(skip_all, name = "settings.repo.insert_default")]
    async fn insert_default(&self, defaults: &GlobalSettings) -> Result<bool, RoomServiceError> {
        let start = Instant::now();

        let result = sqlx::query(
            r"
            INSERT INTO global_settings (id, recordings_enabled, webhooks_enabled)
            VALUES (true, $1, $2)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(defaults.recordings_enabled)
        .bind(defaults.webhooks_enabled)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("insert_default_settings", "error", start.elapsed());
            RoomServiceError::Database(e.to_string())
        })?;

        metrics::record_db_query("insert_default_settings", "success", start.elapsed());
        Ok(result.rows_affected() > 0)
    }
}
