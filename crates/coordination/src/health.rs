//! Coordination store health signal.
//!
//! The scheduler must pause fleet-coordinated work while the store is
//! unreachable (locks cannot be taken safely) and resume when it comes
//! back. Rather than ad hoc event-emitter wiring, connectivity is modeled
//! as a single state value published on a `tokio::sync::watch` channel:
//! the monitor is the producer, the scheduler (and readiness probes) are
//! consumers. Only transitions are observable, which makes the scheduler's
//! reaction a plain, testable state-transition function.

use tokio::sync::watch;

/// Connectivity state of the coordination store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreHealth {
    /// Store reachable; locks can be taken and tasks may run.
    Ready,
    /// Store unreachable; fleet-coordinated work must be quiesced.
    Unavailable,
}

/// Create a health channel starting in the [`StoreHealth::Unavailable`]
/// state. Tasks are only attached after the first `Ready` observation.
#[must_use]
pub fn health_channel() -> (watch::Sender<StoreHealth>, watch::Receiver<StoreHealth>) {
    watch::channel(StoreHealth::Unavailable)
}
