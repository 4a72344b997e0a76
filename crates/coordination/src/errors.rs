//! Coordination core error types.
//!
//! Lock contention is deliberately NOT an error: `acquire` returns
//! `Ok(None)` when another holder is present, and callers treat that as
//! "already handled elsewhere". Errors here mean the coordination store
//! itself could not be used safely, which callers must treat as
//! "cannot proceed", never as "proceed unlocked".

use thiserror::Error;

/// Coordination core error type.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// The coordination store rejected or could not complete an operation.
    /// Fail-closed: dependent work must be skipped, not run unlocked.
    #[error("Coordination store error: {0}")]
    Store(String),

    /// A task schedule or interval string could not be interpreted.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A task was registered against a scheduler that has been shut down.
    #[error("Scheduler is shut down")]
    SchedulerShutDown,
}
