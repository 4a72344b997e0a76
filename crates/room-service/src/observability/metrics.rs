//! Metrics definitions for the room service.
//!
//! Prometheus naming conventions: `room_` prefix, `_total` suffix for
//! counters, `_seconds` suffix for duration histograms. Labels are bounded
//! by code (query operation names, cleanup kinds) so cardinality cannot
//! explode.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle for serving
/// `/metrics`. Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns an error if the recorder fails to install (e.g., already
/// installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("room_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record a repository query.
///
/// Metrics: `room_db_queries_total`, `room_db_query_duration_seconds`
/// Labels: `operation`, `status` (success | error)
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    counter!(
        "room_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    histogram!(
        "room_db_query_duration_seconds",
        "operation" => operation.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record one room GC sweep.
///
/// Metric: `room_gc_rooms_total`
/// Labels: `outcome` (deleted | deferred | failed)
pub fn record_room_sweep(deleted: u64, deferred: u64, failed: u64) {
    counter!("room_gc_rooms_total", "outcome" => "deleted").increment(deleted);
    counter!("room_gc_rooms_total", "outcome" => "deferred").increment(deferred);
    counter!("room_gc_rooms_total", "outcome" => "failed").increment(failed);
}

/// Record recordings or locks reclaimed by a cleanup path.
///
/// Metric: `room_recording_cleanups_total`
/// Labels: `kind` (stale | stuck_start | orphaned_lock)
pub fn record_recording_cleanup(kind: &'static str, count: u64) {
    counter!("room_recording_cleanups_total", "kind" => kind).increment(count);
}
