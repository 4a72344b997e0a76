//! In-memory settings repository.

use crate::lock;
use async_trait::async_trait;
use room_service::errors::RoomServiceError;
use room_service::models::GlobalSettings;
use room_service::repositories::SettingsRepository;
use std::sync::{Arc, Mutex};

/// In-memory single-document [`SettingsRepository`].
#[derive(Debug, Clone, Default)]
pub struct InMemorySettingsRepository {
    inner: Arc<Mutex<Option<GlobalSettings>>>,
}

impl InMemorySettingsRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing settings document.
    #[must_use]
    pub fn with_settings(self, settings: GlobalSettings) -> Self {
        *lock(&self.inner) = Some(settings);
        self
    }

    /// Write the document directly (simulates another instance's insert).
    pub fn set(&self, settings: GlobalSettings) {
        *lock(&self.inner) = Some(settings);
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn get(&self) -> Result<Option<GlobalSettings>, RoomServiceError> {
        Ok(lock(&self.inner).clone())
    }

    async fn insert_default(&self, defaults: &GlobalSettings) -> Result<bool, RoomServiceError> {
        let mut inner = lock(&self.inner);
        if inner.is_some() {
            return Ok(false);
        }
        *inner = Some(defaults.clone());
        Ok(true)
    }
}
