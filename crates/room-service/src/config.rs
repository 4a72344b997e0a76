//! Room service configuration.
//!
//! Configuration is loaded from environment variables. Connection URLs are
//! wrapped in `SecretString` and redacted in Debug output. Interval values
//! use the human-readable form accepted by
//! [`coordination::cron_expr::parse_interval`] (`"30m"`, `"2h"`, `"45s"`).

use crate::lifecycle::recordings::RecordingConfig;
use crate::lifecycle::rooms::RoomGcConfig;
use crate::models::DeletionPolicy;
use common::secret::SecretString;
use coordination::cron_expr::parse_interval;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default coordination store probe interval.
pub const DEFAULT_STORE_PING_INTERVAL: &str = "5s";

/// Default room GC sweep cadence.
pub const DEFAULT_ROOM_GC_INTERVAL: &str = "30m";

/// Default minimum lead time for a newly accepted auto-deletion date.
pub const DEFAULT_MIN_AUTO_DELETION_LEAD: &str = "10m";

/// Default recording slot lock TTL (expected duration plus margin).
pub const DEFAULT_RECORDING_LOCK_TTL: &str = "2h";

/// Default stuck-start watchdog timeout.
pub const DEFAULT_RECORDING_START_TIMEOUT: &str = "30s";

/// Default no-progress threshold for stale recordings.
pub const DEFAULT_RECORDING_STALE_THRESHOLD: &str = "2m";

/// Default staleness sweep cadence.
pub const DEFAULT_RECORDING_STALENESS_INTERVAL: &str = "1m";

/// Default orphaned-lock sweep cadence.
pub const DEFAULT_RECORDING_LOCK_GC_INTERVAL: &str = "5m";

/// Default minimum lock age before the orphan sweep may reclaim it.
pub const DEFAULT_RECORDING_LOCK_GC_GRACE: &str = "60s";

/// Default instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "room";

/// Room service configuration, loaded from environment variables with
/// sensible defaults. Sensitive fields are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// Redis connection URL (coordination store). May embed credentials.
    pub redis_url: SecretString,

    /// PostgreSQL connection URL. May embed credentials.
    pub database_url: SecretString,

    /// Maximum connections in the database pool.
    pub db_max_connections: u32,

    /// Health endpoint bind address.
    pub health_bind_address: String,

    /// Unique identifier for this instance (logs only; lock tokens are
    /// minted per attempt).
    pub instance_id: String,

    /// Coordination store probe cadence.
    pub store_ping_interval: Duration,

    /// Room GC sweep cadence.
    pub room_gc_interval: Duration,

    /// What room deletion takes with it.
    pub deletion_policy: DeletionPolicy,

    /// Minimum lead time for a newly accepted auto-deletion date.
    pub min_auto_deletion_lead: Duration,

    /// Recording slot lock TTL.
    pub recording_lock_ttl: Duration,

    /// Stuck-start watchdog timeout.
    pub recording_start_timeout: Duration,

    /// No-progress threshold for stale recordings.
    pub recording_stale_threshold: Duration,

    /// Staleness sweep cadence.
    pub recording_staleness_interval: Duration,

    /// Orphaned-lock sweep cadence.
    pub recording_lock_gc_interval: Duration,

    /// Minimum lock age before the orphan sweep may reclaim it.
    pub recording_lock_gc_grace: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("redis_url", &"[REDACTED]")
            .field("database_url", &"[REDACTED]")
            .field("db_max_connections", &self.db_max_connections)
            .field("health_bind_address", &self.health_bind_address)
            .field("instance_id", &self.instance_id)
            .field("store_ping_interval", &self.store_ping_interval)
            .field("room_gc_interval", &self.room_gc_interval)
            .field("deletion_policy", &self.deletion_policy)
            .field("min_auto_deletion_lead", &self.min_auto_deletion_lead)
            .field("recording_lock_ttl", &self.recording_lock_ttl)
            .field("recording_start_timeout", &self.recording_start_timeout)
            .field(
                "recording_stale_threshold",
                &self.recording_stale_threshold,
            )
            .field(
                "recording_staleness_interval",
                &self.recording_staleness_interval,
            )
            .field(
                "recording_lock_gc_interval",
                &self.recording_lock_gc_interval,
            )
            .field("recording_lock_gc_grace", &self.recording_lock_gc_grace)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for missing required variables or malformed
    /// values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for missing required variables or malformed
    /// values.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let redis_url = SecretString::from(
            vars.get("REDIS_URL")
                .ok_or_else(|| ConfigError::MissingEnvVar("REDIS_URL".to_string()))?
                .clone(),
        );

        let database_url = SecretString::from(
            vars.get("DATABASE_URL")
                .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
                .clone(),
        );

        let db_max_connections = vars
            .get("DB_MAX_CONNECTIONS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let health_bind_address = vars
            .get("HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let deletion_policy = match vars.get("ROOM_DELETION_POLICY") {
            Some(raw) => DeletionPolicy::parse(raw).ok_or_else(|| {
                ConfigError::InvalidValue(format!("ROOM_DELETION_POLICY: unknown policy '{raw}'"))
            })?,
            None => DeletionPolicy::WithRecordings,
        };

        // Generate instance ID
        let instance_id = vars.get("INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            redis_url,
            database_url,
            db_max_connections,
            health_bind_address,
            instance_id,
            store_ping_interval: interval_var(
                vars,
                "STORE_PING_INTERVAL",
                DEFAULT_STORE_PING_INTERVAL,
            )?,
            room_gc_interval: interval_var(vars, "ROOM_GC_INTERVAL", DEFAULT_ROOM_GC_INTERVAL)?,
            deletion_policy,
            min_auto_deletion_lead: interval_var(
                vars,
                "ROOM_MIN_AUTO_DELETION_LEAD",
                DEFAULT_MIN_AUTO_DELETION_LEAD,
            )?,
            recording_lock_ttl: interval_var(
                vars,
                "RECORDING_LOCK_TTL",
                DEFAULT_RECORDING_LOCK_TTL,
            )?,
            recording_start_timeout: interval_var(
                vars,
                "RECORDING_START_TIMEOUT",
                DEFAULT_RECORDING_START_TIMEOUT,
            )?,
            recording_stale_threshold: interval_var(
                vars,
                "RECORDING_STALE_THRESHOLD",
                DEFAULT_RECORDING_STALE_THRESHOLD,
            )?,
            recording_staleness_interval: interval_var(
                vars,
                "RECORDING_STALENESS_INTERVAL",
                DEFAULT_RECORDING_STALENESS_INTERVAL,
            )?,
            recording_lock_gc_interval: interval_var(
                vars,
                "RECORDING_LOCK_GC_INTERVAL",
                DEFAULT_RECORDING_LOCK_GC_INTERVAL,
            )?,
            recording_lock_gc_grace: interval_var(
                vars,
                "RECORDING_LOCK_GC_GRACE",
                DEFAULT_RECORDING_LOCK_GC_GRACE,
            )?,
        })
    }

    /// Room GC engine configuration.
    #[must_use]
    pub fn room_gc_config(&self) -> RoomGcConfig {
        RoomGcConfig {
            sweep_interval: self.room_gc_interval,
            deletion_policy: self.deletion_policy,
            min_auto_deletion_lead: self.min_auto_deletion_lead,
        }
    }

    /// Recording engine configuration.
    #[must_use]
    pub fn recording_config(&self) -> RecordingConfig {
        RecordingConfig {
            lock_ttl: self.recording_lock_ttl,
            start_timeout: self.recording_start_timeout,
            stale_threshold: self.recording_stale_threshold,
            staleness_sweep_interval: self.recording_staleness_interval,
            lock_gc_interval: self.recording_lock_gc_interval,
            lock_gc_grace: self.recording_lock_gc_grace,
        }
    }
}

fn interval_var(
    vars: &HashMap<String, String>,
    name: &str,
    default: &str,
) -> Result<Duration, ConfigError> {
    let raw = vars.get(name).map_or(default, String::as_str);
    parse_interval(raw).map_err(|e| ConfigError::InvalidValue(format!("{name}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "REDIS_URL".to_string(),
                "redis://localhost:6379".to_string(),
            ),
            (
                "DATABASE_URL".to_string(),
                "postgres://app:pw@localhost/atrium".to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load");

        assert_eq!(config.redis_url.expose_secret(), "redis://localhost:6379");
        assert_eq!(config.health_bind_address, DEFAULT_HEALTH_BIND_ADDRESS);
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.room_gc_interval, Duration::from_secs(1_800));
        assert_eq!(config.deletion_policy, DeletionPolicy::WithRecordings);
        assert_eq!(config.min_auto_deletion_lead, Duration::from_secs(600));
        assert_eq!(config.recording_lock_ttl, Duration::from_secs(7_200));
        assert_eq!(config.recording_start_timeout, Duration::from_secs(30));
        assert_eq!(config.recording_stale_threshold, Duration::from_secs(120));
        assert_eq!(
            config.recording_staleness_interval,
            Duration::from_secs(60)
        );
        assert_eq!(
            config.recording_lock_gc_interval,
            Duration::from_secs(300)
        );
        assert_eq!(config.recording_lock_gc_grace, Duration::from_secs(60));
        assert!(config.instance_id.starts_with("room-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("HEALTH_BIND_ADDRESS".to_string(), "127.0.0.1:9090".to_string());
        vars.insert("ROOM_GC_INTERVAL".to_string(), "1h".to_string());
        vars.insert("ROOM_DELETION_POLICY".to_string(), "room-only".to_string());
        vars.insert("RECORDING_LOCK_TTL".to_string(), "90m".to_string());
        vars.insert("DB_MAX_CONNECTIONS".to_string(), "25".to_string());
        vars.insert("INSTANCE_ID".to_string(), "room-custom-001".to_string());

        let config = Config::from_vars(&vars).expect("Config should load");

        assert_eq!(config.health_bind_address, "127.0.0.1:9090");
        assert_eq!(config.room_gc_interval, Duration::from_secs(3_600));
        assert_eq!(config.deletion_policy, DeletionPolicy::RoomOnly);
        assert_eq!(config.recording_lock_ttl, Duration::from_secs(5_400));
        assert_eq!(config.db_max_connections, 25);
        assert_eq!(config.instance_id, "room-custom-001");
    }

    #[test]
    fn test_from_vars_missing_redis_url() {
        let mut vars = base_vars();
        vars.remove("REDIS_URL");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "REDIS_URL"));
    }

    #[test]
    fn test_from_vars_missing_database_url() {
        let mut vars = base_vars();
        vars.remove("DATABASE_URL");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_from_vars_rejects_bad_interval() {
        let mut vars = base_vars();
        vars.insert("ROOM_GC_INTERVAL".to_string(), "soon".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(v)) if v.contains("ROOM_GC_INTERVAL")));
    }

    #[test]
    fn test_from_vars_rejects_bad_policy() {
        let mut vars = base_vars();
        vars.insert("ROOM_DELETION_POLICY".to_string(), "everything".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let config = Config::from_vars(&base_vars()).expect("Config should load");
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("redis://"));
        assert!(!debug_output.contains("postgres://"));
    }

    #[test]
    fn test_engine_config_projections() {
        let config = Config::from_vars(&base_vars()).expect("Config should load");

        let gc = config.room_gc_config();
        assert_eq!(gc.sweep_interval, config.room_gc_interval);
        assert_eq!(gc.deletion_policy, config.deletion_policy);

        let rec = config.recording_config();
        assert_eq!(rec.lock_ttl, config.recording_lock_ttl);
        assert_eq!(rec.start_timeout, config.recording_start_timeout);
    }
}
