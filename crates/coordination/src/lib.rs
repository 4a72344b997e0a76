//! Atrium distributed coordination core.
//!
//! Lets several stateless backend instances safely share mutable,
//! time-sensitive resources using only a Redis key-value store as the
//! coordination substrate: no leader election, no consensus protocol,
//! just TTL-bounded leases with at-most-one-holder semantics and a
//! scheduler that takes a lease before every firing of a fleet-wide job.
//!
//! # Guarantees
//!
//! - At-most-one *concurrent* holder per lock key, enforced by the
//!   store's atomic create-if-absent and delete-if-owner operations.
//! - A crashed holder's resource becomes available again within one TTL
//!   window (leases self-expire; there are no heartbeats to maintain).
//! - Store unavailability fails closed: nothing runs unlocked.
//!
//! Not guaranteed: exactly-once execution of side effects, or any
//! ordering across instances beyond mutual exclusion.
//!
//! # Modules
//!
//! - [`lock`] - lease primitive: [`lock::LockStore`] trait and guards
//! - [`redis`] - Redis-backed store and connection monitor
//! - [`mutex`] - [`mutex::MutexService`], named TTL-bounded locks
//! - [`scheduler`] - [`scheduler::TaskScheduler`], fleet-wide cron/timeout jobs
//! - [`cron_expr`] - pure schedule arithmetic (interval -> cron, lock TTLs)
//! - [`health`] - store connectivity signal consumed by the scheduler
//! - [`errors`] - [`errors::CoordinationError`]

pub mod cron_expr;
pub mod errors;
pub mod health;
pub mod lock;
pub mod mutex;
pub mod redis;
pub mod scheduler;

pub use errors::CoordinationError;
pub use health::StoreHealth;
pub use lock::{lock_key, LockGuard, LockStore, LOCK_KEY_PREFIX};
pub use mutex::MutexService;
pub use scheduler::{task_lock_name, TaskAction, TaskFuture, TaskScheduler};
