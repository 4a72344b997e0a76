//! Pure schedule arithmetic: interval parsing, interval-to-cron synthesis,
//! and lock-TTL derivation.
//!
//! Everything here is a pure function so the translation rules can be unit
//! tested in isolation from the scheduler's runtime behavior.

use crate::errors::CoordinationError;
use std::time::Duration;

/// Fixed margin subtracted from a task's interval when deriving its lock
/// TTL, so a lease from one firing cannot still be held when the next
/// firing occurs under normal conditions.
pub const LOCK_TTL_MARGIN: Duration = Duration::from_secs(5);

/// Absolute floor for derived lock TTLs. Protects very-high-frequency
/// tasks from a TTL of (near) zero.
pub const MIN_LOCK_TTL: Duration = Duration::from_secs(1);

/// Derive the per-firing lock TTL for a recurring task with the given
/// interval: `interval - LOCK_TTL_MARGIN`, floored at [`MIN_LOCK_TTL`].
#[must_use]
pub fn lock_ttl_for_interval(interval: Duration) -> Duration {
    interval.saturating_sub(LOCK_TTL_MARGIN).max(MIN_LOCK_TTL)
}

/// Translate a recurring interval into a six-field cron expression
/// (`sec min hour day month day-of-week`).
///
/// Precedence, coarsest granularity first:
/// - whole days: fire at midnight every N days
/// - else whole hours: fire on the hour every N hours
/// - else whole minutes: fire every N minutes
/// - else 30-59 seconds: fire every minute
/// - else: fire every N seconds, floored at 1
///
/// The coarsening is intentionally lossy: a 90-minute interval fires
/// hourly, and a 45-second interval fires once a minute. Callers that care
/// about the requested-vs-effective cadence gap must detect it themselves
/// (the scheduler logs it at registration).
#[must_use]
pub fn interval_to_cron(interval: Duration) -> String {
    let total_secs = interval.as_secs();

    let days = total_secs / 86_400;
    if days >= 1 {
        return format!("0 0 0 */{days} * *");
    }

    let hours = total_secs / 3_600;
    if hours >= 1 {
        return format!("0 0 */{hours} * * *");
    }

    let minutes = total_secs / 60;
    if minutes >= 1 {
        return format!("0 */{minutes} * * * *");
    }

    if total_secs >= 30 {
        return "0 * * * * *".to_string();
    }

    let secs = total_secs.max(1);
    format!("*/{secs} * * * * *")
}

/// Whether [`interval_to_cron`] collapses this interval to whole-minute
/// granularity (the 30-59 second band).
#[must_use]
pub fn is_coarsened_to_minute(interval: Duration) -> bool {
    let secs = interval.as_secs();
    (30..60).contains(&secs)
}

/// Parse a human-readable interval string: an integer followed by an
/// optional unit suffix (`s`, `m`, `h`, `d`). A bare integer is seconds.
///
/// # Errors
///
/// Returns [`CoordinationError::InvalidSchedule`] for empty input, unknown
/// suffixes, non-numeric magnitudes, or a zero interval.
pub fn parse_interval(spec: &str) -> Result<Duration, CoordinationError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(CoordinationError::InvalidSchedule(
            "empty interval".to_string(),
        ));
    }

    let (magnitude, multiplier) = if let Some(rest) = spec.strip_suffix('s') {
        (rest, 1)
    } else if let Some(rest) = spec.strip_suffix('m') {
        (rest, 60)
    } else if let Some(rest) = spec.strip_suffix('h') {
        (rest, 3_600)
    } else if let Some(rest) = spec.strip_suffix('d') {
        (rest, 86_400)
    } else {
        (spec, 1)
    };

    let value: u64 = magnitude.parse().map_err(|_| {
        CoordinationError::InvalidSchedule(format!("invalid interval magnitude in '{spec}'"))
    })?;

    if value == 0 {
        return Err(CoordinationError::InvalidSchedule(format!(
            "zero interval '{spec}'"
        )));
    }

    Ok(Duration::from_secs(value * multiplier))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use cron::Schedule;
    use std::str::FromStr;

    #[test]
    fn test_lock_ttl_biased_below_interval() {
        assert_eq!(
            lock_ttl_for_interval(Duration::from_secs(60)),
            Duration::from_secs(55)
        );
        assert_eq!(
            lock_ttl_for_interval(Duration::from_secs(3_600)),
            Duration::from_secs(3_595)
        );
    }

    #[test]
    fn test_lock_ttl_floor() {
        // Interval smaller than the margin must not produce a zero TTL
        assert_eq!(
            lock_ttl_for_interval(Duration::from_secs(3)),
            MIN_LOCK_TTL
        );
        assert_eq!(
            lock_ttl_for_interval(Duration::from_secs(5)),
            MIN_LOCK_TTL
        );
        // Just above the margin, the subtraction applies but the floor wins
        assert_eq!(
            lock_ttl_for_interval(Duration::from_secs(6)),
            MIN_LOCK_TTL
        );
    }

    #[test]
    fn test_interval_to_cron_days() {
        assert_eq!(
            interval_to_cron(Duration::from_secs(86_400)),
            "0 0 0 */1 * *"
        );
        assert_eq!(
            interval_to_cron(Duration::from_secs(3 * 86_400)),
            "0 0 0 */3 * *"
        );
    }

    #[test]
    fn test_interval_to_cron_hours() {
        assert_eq!(
            interval_to_cron(Duration::from_secs(3_600)),
            "0 0 */1 * * *"
        );
        assert_eq!(
            interval_to_cron(Duration::from_secs(6 * 3_600)),
            "0 0 */6 * * *"
        );
        // 90 minutes coarsens to hourly
        assert_eq!(
            interval_to_cron(Duration::from_secs(5_400)),
            "0 0 */1 * * *"
        );
    }

    #[test]
    fn test_interval_to_cron_minutes() {
        assert_eq!(interval_to_cron(Duration::from_secs(60)), "0 */1 * * * *");
        assert_eq!(
            interval_to_cron(Duration::from_secs(30 * 60)),
            "0 */30 * * * *"
        );
    }

    #[test]
    fn test_interval_to_cron_sub_minute_band_collapses() {
        // 30-59 seconds collapse to whole-minute cadence
        assert_eq!(interval_to_cron(Duration::from_secs(30)), "0 * * * * *");
        assert_eq!(interval_to_cron(Duration::from_secs(45)), "0 * * * * *");
        assert_eq!(interval_to_cron(Duration::from_secs(59)), "0 * * * * *");
    }

    #[test]
    fn test_interval_to_cron_small_seconds() {
        assert_eq!(interval_to_cron(Duration::from_secs(15)), "*/15 * * * * *");
        assert_eq!(interval_to_cron(Duration::from_secs(1)), "*/1 * * * * *");
        // Sub-second floors at one second
        assert_eq!(
            interval_to_cron(Duration::from_millis(200)),
            "*/1 * * * * *"
        );
    }

    #[test]
    fn test_synthesized_expressions_parse() {
        for interval in [1, 15, 30, 45, 60, 300, 3_600, 5_400, 86_400, 259_200] {
            let expr = interval_to_cron(Duration::from_secs(interval));
            assert!(
                Schedule::from_str(&expr).is_ok(),
                "'{expr}' must be a valid schedule"
            );
        }
    }

    #[test]
    fn test_is_coarsened_to_minute() {
        assert!(!is_coarsened_to_minute(Duration::from_secs(29)));
        assert!(is_coarsened_to_minute(Duration::from_secs(30)));
        assert!(is_coarsened_to_minute(Duration::from_secs(59)));
        assert!(!is_coarsened_to_minute(Duration::from_secs(60)));
    }

    #[test]
    fn test_parse_interval_units() {
        assert_eq!(parse_interval("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_interval("30m").unwrap(), Duration::from_secs(1_800));
        assert_eq!(parse_interval("1h").unwrap(), Duration::from_secs(3_600));
        assert_eq!(parse_interval("2d").unwrap(), Duration::from_secs(172_800));
        assert_eq!(parse_interval("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_interval(" 10m ").unwrap(), Duration::from_secs(600));
    }

    #[test]
    fn test_parse_interval_rejects_garbage() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("h").is_err());
        assert!(parse_interval("10w").is_err());
        assert!(parse_interval("abc").is_err());
        assert!(parse_interval("0s").is_err());
        assert!(parse_interval("-5m").is_err());
    }
}
