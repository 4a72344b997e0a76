//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use these types
//! for all sensitive values: connection URLs with embedded credentials,
//! API keys, and tokens.
//!
//! `SecretString` implements `Debug` with redaction, so any struct that
//! derives `Debug` while holding one gets safe logging behavior for free.
//! Secrets are zeroized when dropped.
//!
//! # Example
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct StoreConfig {
//!     pool_size: usize,
//!     redis_url: SecretString,  // Safe: Debug shows "[REDACTED]"
//! }
//!
//! let config = StoreConfig {
//!     pool_size: 8,
//!     redis_url: SecretString::from("redis://:hunter2@localhost:6379"),
//! };
//!
//! // Safe - the URL (and its password) is redacted
//! println!("{:?}", config);
//!
//! // Access requires an explicit expose_secret() call
//! let url: &str = config.redis_url.expose_secret();
//! ```
//!
//! # Atrium Usage Guidelines
//!
//! Use `SecretString` for:
//! - Redis connection URLs (may embed a password)
//! - PostgreSQL connection URLs
//! - Webhook signing secrets
//!
//! Use `SecretBox<T>` for custom secret types (e.g., binary key material).

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};
