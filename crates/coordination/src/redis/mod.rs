//! Redis-backed coordination store.

pub mod client;
pub mod lua_scripts;

pub use client::{ConnectionMonitor, RedisLockStore, DEFAULT_PING_INTERVAL};
