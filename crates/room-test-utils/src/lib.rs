//! In-memory collaborators for room service tests.
//!
//! Mirrors the production trait contracts closely enough for lifecycle
//! scenarios: expiry filtering, idempotent marking, staleness cutoffs and
//! the single-row settings document. Failure injection is per-room where a
//! sweep's isolation behavior needs exercising.

mod media;
mod recordings;
mod rooms;
mod settings;

pub use media::MockMediaEngine;
pub use recordings::InMemoryRecordingRepository;
pub use rooms::{make_room, InMemoryRoomRepository};
pub use settings::InMemorySettingsRepository;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
