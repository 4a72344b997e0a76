//! Health endpoints for the room service.
//!
//! Kubernetes-compatible probes:
//! - `GET /health` - liveness (is the process running?)
//! - `GET /ready` - readiness (is the coordination store reachable?)
//!
//! Readiness tracks the coordination store: an instance that cannot take
//! locks must not receive traffic that depends on them. The `/metrics`
//! endpoint is served separately by the Prometheus exporter handle.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use coordination::StoreHealth;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Liveness/readiness state behind the probe endpoints.
#[derive(Debug)]
pub struct HealthState {
    live: AtomicBool,
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (live, not yet ready).
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Mirror coordination-store health transitions into readiness until
/// cancelled. Spawn alongside the scheduler's run loop.
pub async fn readiness_follows_store(
    state: Arc<HealthState>,
    mut health: watch::Receiver<StoreHealth>,
    cancel_token: CancellationToken,
) {
    apply(&state, *health.borrow_and_update());

    loop {
        tokio::select! {
            changed = health.changed() => {
                if changed.is_err() {
                    state.set_not_ready();
                    break;
                }
                apply(&state, *health.borrow_and_update());
            }
            () = cancel_token.cancelled() => {
                info!("Readiness mirror received shutdown signal, exiting");
                state.set_not_ready();
                break;
            }
        }
    }
}

fn apply(state: &HealthState, health: StoreHealth) {
    match health {
        StoreHealth::Ready => state.set_ready(),
        StoreHealth::Unavailable => state.set_not_ready(),
    }
}

/// Router with the liveness and readiness endpoints.
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(health_state)
}

async fn liveness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
