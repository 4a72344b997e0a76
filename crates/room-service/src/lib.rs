//! Atrium Room Service Library
//!
//! This library provides the lifecycle engines of the Atrium meeting
//! backend, built on the [`coordination`] core so that any number of
//! stateless instances can run them concurrently:
//!
//! - Room auto-deletion: a periodic sweep enforces each room's
//!   `auto_deletion_date`, deferring occupied rooms and deleting them
//!   reactively when the media engine reports them empty
//! - Recording slots: at most one non-terminal recording per room,
//!   stuck-start detection, staleness and orphaned-lock sweeps
//! - Global settings bootstrap: fleet-safe first-time initialization
//!
//! # Key Design Decisions
//!
//! - **Leases over liveness detection**: every lock self-expires, so a
//!   crashed instance's resources free themselves within one TTL window
//! - **Traits at the seams**: storage and the media engine are
//!   collaborator traits; tests run the engines against in-memory fakes
//! - **Contention is not an error**: denied locks mean "already handled
//!   elsewhere" and are skipped, not retried
//!
//! # Modules
//!
//! - [`lifecycle`] - room GC and recording engines
//! - [`bootstrap`] - global settings initialization
//! - [`repositories`] - persistence collaborator traits and Postgres impls
//! - [`media`] - media engine collaborator trait
//! - [`config`] - service configuration from environment
//! - [`observability`] - health endpoints and metrics
//! - [`errors`] - error types with contention classification

pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod media;
pub mod models;
pub mod observability;
pub mod repositories;
