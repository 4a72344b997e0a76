//! Recording slot scenarios: exclusion, stuck starts, staleness and
//! orphaned locks.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration as ChronoDuration, Utc};
use coordination::health::{health_channel, StoreHealth};
use coordination::{lock_key, LockStore, MutexService, TaskScheduler};
use coordination_test_utils::MockLockStore;
use room_service::errors::RoomServiceError;
use room_service::lifecycle::recordings::{
    recording_lock_name, RecordingConfig, RecordingLifecycle,
};
use room_service::models::{RecordingRow, RecordingStatus};
use room_service::repositories::RecordingRepository;
use room_test_utils::{InMemoryRecordingRepository, MockMediaEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

struct Harness {
    store: Arc<MockLockStore>,
    recordings: InMemoryRecordingRepository,
    media: MockMediaEngine,
    lifecycle: Arc<RecordingLifecycle>,
    scheduler: TaskScheduler,
    health_tx: watch::Sender<StoreHealth>,
}

fn harness(config: RecordingConfig) -> Harness {
    let store = Arc::new(MockLockStore::new());
    let mutex = Arc::new(MutexService::new(
        Arc::clone(&store) as Arc<dyn LockStore>
    ));
    let (health_tx, health_rx) = health_channel();
    let scheduler = TaskScheduler::new(Arc::clone(&mutex), health_rx);
    tokio::spawn(scheduler.clone().run());

    let recordings = InMemoryRecordingRepository::new();
    let media = MockMediaEngine::new();

    let lifecycle = Arc::new(RecordingLifecycle::new(
        mutex,
        scheduler.clone(),
        Arc::new(recordings.clone()),
        Arc::new(media.clone()),
        config,
    ));

    Harness {
        store,
        recordings,
        media,
        lifecycle,
        scheduler,
        health_tx,
    }
}

fn default_config() -> RecordingConfig {
    RecordingConfig {
        lock_ttl: Duration::from_secs(7_200),
        start_timeout: Duration::from_millis(100),
        stale_threshold: Duration::from_secs(120),
        staleness_sweep_interval: Duration::from_secs(3_600),
        lock_gc_interval: Duration::from_secs(3_600),
        lock_gc_grace: Duration::from_secs(60),
    }
}

fn slot_key(room_id: &str) -> String {
    lock_key(&recording_lock_name(room_id))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

#[tokio::test]
async fn test_start_takes_slot_and_creates_starting_row() {
    let h = harness(default_config());

    let recording = h.lifecycle.start_recording("room-1").await.unwrap();

    assert_eq!(recording.status, RecordingStatus::Starting);
    assert!(h.store.holder(&slot_key("room-1")).is_some());
    assert_eq!(h.media.started_recordings(), vec!["room-1"]);
    assert_eq!(
        h.recordings.get(&recording.recording_id).unwrap().status,
        RecordingStatus::Starting
    );
}

#[tokio::test]
async fn test_second_start_is_rejected_while_slot_held() {
    let h = harness(default_config());

    let first = h.lifecycle.start_recording("room-1").await.unwrap();
    h.lifecycle
        .handle_status_update(&first.recording_id, RecordingStatus::Active)
        .await
        .unwrap();

    let second = h.lifecycle.start_recording("room-1").await;
    let err = second.expect_err("second start must be rejected");
    assert!(matches!(err, RoomServiceError::RecordingAlreadyInProgress(_)));
    assert!(err.is_contention());

    // An unrelated room is unaffected
    assert!(h.lifecycle.start_recording("room-2").await.is_ok());
}

#[tokio::test]
async fn test_terminal_state_frees_the_slot() {
    let h = harness(default_config());

    let first = h.lifecycle.start_recording("room-1").await.unwrap();
    h.lifecycle
        .handle_status_update(&first.recording_id, RecordingStatus::Active)
        .await
        .unwrap();
    h.lifecycle
        .handle_status_update(&first.recording_id, RecordingStatus::Complete)
        .await
        .unwrap();

    assert!(h.store.holder(&slot_key("room-1")).is_none());

    let second = h.lifecycle.start_recording("room-1").await;
    assert!(second.is_ok(), "slot must be reusable after a terminal state");
}

#[tokio::test]
async fn test_media_rejection_frees_slot_and_fails_row() {
    let h = harness(default_config());
    h.media.set_reject_recording_start(true);

    let result = h.lifecycle.start_recording("room-1").await;
    assert!(matches!(result, Err(RoomServiceError::Media(_))));

    assert!(h.store.holder(&slot_key("room-1")).is_none());
    // The attempt's row is failed, not dangling in Starting
    let stale = h
        .recordings
        .find_stale(Utc::now() + ChronoDuration::seconds(1))
        .await
        .unwrap();
    assert!(stale.is_empty(), "no non-terminal rows may remain");

    h.media.set_reject_recording_start(false);
    assert!(h.lifecycle.start_recording("room-1").await.is_ok());
}

#[tokio::test]
async fn test_stuck_start_watchdog_frees_slot() {
    let h = harness(default_config());

    // Scheduler must be attached for the watchdog timeout task to run
    h.health_tx.send(StoreHealth::Ready).unwrap();
    settle().await;

    let recording = h.lifecycle.start_recording("room-1").await.unwrap();

    // Never progresses out of Starting; the watchdog (100ms) fails it
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(
        h.recordings.get(&recording.recording_id).unwrap().status,
        RecordingStatus::Failed
    );
    assert!(h.store.holder(&slot_key("room-1")).is_none());

    // A retry can now succeed
    assert!(h.lifecycle.start_recording("room-1").await.is_ok());

    h.scheduler.shutdown();
}

#[tokio::test]
async fn test_watchdog_leaves_progressing_recording_alone() {
    let h = harness(default_config());
    h.health_tx.send(StoreHealth::Ready).unwrap();
    settle().await;

    let recording = h.lifecycle.start_recording("room-1").await.unwrap();
    h.lifecycle
        .handle_status_update(&recording.recording_id, RecordingStatus::Active)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(
        h.recordings.get(&recording.recording_id).unwrap().status,
        RecordingStatus::Active
    );
    assert!(
        h.store.holder(&slot_key("room-1")).is_some(),
        "an active recording keeps its slot"
    );

    h.scheduler.shutdown();
}

#[tokio::test]
async fn test_staleness_sweep_aborts_stalled_recording() {
    let h = harness(default_config());

    // A recording that stopped reporting progress ten minutes ago, its
    // slot lock still held (the TTL backstop is hours away)
    let now = Utc::now();
    h.recordings.insert(RecordingRow {
        recording_id: "rec-stale".to_string(),
        room_id: "room-1".to_string(),
        status: RecordingStatus::Active,
        started_at: now - ChronoDuration::minutes(30),
        last_updated_at: now - ChronoDuration::minutes(10),
    });
    h.store
        .try_acquire(&slot_key("room-1"), "crashed-instance", Duration::from_secs(7_200))
        .await
        .unwrap();

    let cleaned = h.lifecycle.staleness_sweep().await.unwrap();

    assert_eq!(cleaned, 1);
    assert_eq!(
        h.recordings.get("rec-stale").unwrap().status,
        RecordingStatus::Aborted
    );
    assert!(h.store.holder(&slot_key("room-1")).is_none());

    // The room accepts a new recording immediately
    assert!(h.lifecycle.start_recording("room-1").await.is_ok());
}

#[tokio::test]
async fn test_staleness_sweep_spares_fresh_recordings() {
    let h = harness(default_config());

    let now = Utc::now();
    h.recordings.insert(RecordingRow {
        recording_id: "rec-fresh".to_string(),
        room_id: "room-1".to_string(),
        status: RecordingStatus::Active,
        started_at: now - ChronoDuration::minutes(30),
        last_updated_at: now - ChronoDuration::seconds(30),
    });

    let cleaned = h.lifecycle.staleness_sweep().await.unwrap();

    assert_eq!(cleaned, 0);
    assert_eq!(
        h.recordings.get("rec-fresh").unwrap().status,
        RecordingStatus::Active
    );
}

#[tokio::test(start_paused = true)]
async fn test_lock_gc_releases_orphaned_lock_after_grace() {
    let mut config = default_config();
    config.lock_ttl = Duration::from_secs(600);
    config.lock_gc_grace = Duration::from_secs(60);
    let h = harness(config);

    // A lock with no recording row behind it (creation never happened)
    h.store
        .try_acquire(&slot_key("ghost"), "crashed-instance", Duration::from_secs(600))
        .await
        .unwrap();

    // Inside the grace window: left alone (a start may still be in its
    // window between lock acquisition and row creation)
    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(h.lifecycle.lock_gc_sweep().await.unwrap(), 0);
    assert!(h.store.holder(&slot_key("ghost")).is_some());

    // Past the grace window: reclaimed
    tokio::time::advance(Duration::from_secs(120)).await;
    assert_eq!(h.lifecycle.lock_gc_sweep().await.unwrap(), 1);
    assert!(h.store.holder(&slot_key("ghost")).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_lock_gc_spares_locks_with_live_recordings() {
    let mut config = default_config();
    config.lock_ttl = Duration::from_secs(600);
    config.lock_gc_grace = Duration::from_secs(60);
    let h = harness(config);

    let now = Utc::now();
    h.recordings.insert(RecordingRow {
        recording_id: "rec-live".to_string(),
        room_id: "room-1".to_string(),
        status: RecordingStatus::Active,
        started_at: now,
        last_updated_at: now,
    });
    h.store
        .try_acquire(&slot_key("room-1"), "holder", Duration::from_secs(600))
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(120)).await;

    assert_eq!(h.lifecycle.lock_gc_sweep().await.unwrap(), 0);
    assert!(
        h.store.holder(&slot_key("room-1")).is_some(),
        "a lock backed by a live recording is not an orphan"
    );
}

#[tokio::test(start_paused = true)]
async fn test_lock_gc_releases_lock_of_terminal_recording() {
    let mut config = default_config();
    config.lock_ttl = Duration::from_secs(600);
    config.lock_gc_grace = Duration::from_secs(60);
    let h = harness(config);

    let now = Utc::now();
    h.recordings.insert(RecordingRow {
        recording_id: "rec-done".to_string(),
        room_id: "room-1".to_string(),
        status: RecordingStatus::Complete,
        started_at: now,
        last_updated_at: now,
    });
    h.store
        .try_acquire(&slot_key("room-1"), "holder", Duration::from_secs(600))
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(120)).await;

    assert_eq!(h.lifecycle.lock_gc_sweep().await.unwrap(), 1);
    assert!(h.store.holder(&slot_key("room-1")).is_none());
}

#[tokio::test]
async fn test_stop_recording_transitions_to_ending() {
    let h = harness(default_config());

    let recording = h.lifecycle.start_recording("room-1").await.unwrap();
    h.lifecycle
        .handle_status_update(&recording.recording_id, RecordingStatus::Active)
        .await
        .unwrap();

    let stopped = h.lifecycle.stop_recording("room-1").await.unwrap();
    assert_eq!(stopped.recording_id, recording.recording_id);
    assert_eq!(
        h.recordings.get(&recording.recording_id).unwrap().status,
        RecordingStatus::Ending
    );
    assert_eq!(h.media.stopped_recordings(), vec![recording.recording_id]);
}

#[tokio::test]
async fn test_stop_without_active_recording_is_not_found() {
    let h = harness(default_config());

    let result = h.lifecycle.stop_recording("room-1").await;
    assert!(matches!(result, Err(RoomServiceError::RecordingNotFound(_))));
}

#[tokio::test]
async fn test_status_update_refreshes_progress_timestamp() {
    let h = harness(default_config());

    let recording = h.lifecycle.start_recording("room-1").await.unwrap();
    let before = h
        .recordings
        .get(&recording.recording_id)
        .unwrap()
        .last_updated_at;

    tokio::time::sleep(Duration::from_millis(20)).await;
    h.lifecycle
        .handle_status_update(&recording.recording_id, RecordingStatus::Active)
        .await
        .unwrap();

    let after = h
        .recordings
        .get(&recording.recording_id)
        .unwrap()
        .last_updated_at;
    assert!(after > before, "every observed transition must refresh progress");
}
