//! Room Service
//!
//! Lifecycle engine instance of the Atrium meeting backend. Any number of
//! these run concurrently in HA mode; all cross-instance coordination
//! happens through the Redis lock store.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Connect to Redis (lock store) and Postgres (repositories)
//! 4. Run database migrations
//! 5. Initialize global settings under the fleet-wide config-init lock
//! 6. Spawn the store connection monitor, scheduler and readiness mirror
//! 7. Register the room GC, recording staleness and lock GC sweeps
//! 8. Start the health/metrics HTTP server
//! 9. Wait for shutdown signal; cancel everything via one token tree

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use common::secret::ExposeSecret;
use coordination::redis::RedisLockStore;
use coordination::{LockStore, MutexService, TaskScheduler};
use room_service::bootstrap::ensure_global_settings;
use room_service::config::Config;
use room_service::lifecycle::recordings::RecordingLifecycle;
use room_service::lifecycle::rooms::RoomLifecycle;
use room_service::media::MediaEngine;
use room_service::models::GlobalSettings;
use room_service::observability::{
    health_router, metrics::init_metrics_recorder, readiness_follows_store, HealthState,
};
use room_service::repositories::{
    PgRecordingRepository, PgRoomRepository, PgSettingsRepository, RecordingRepository,
    RoomRepository, SettingsRepository,
};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "room_service=debug,coordination=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Room Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        instance_id = %config.instance_id,
        health_bind_address = %config.health_bind_address,
        room_gc_interval_secs = config.room_gc_interval.as_secs(),
        recording_lock_ttl_secs = config.recording_lock_ttl.as_secs(),
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder before anything records
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    // Connect to Redis (lock store)
    info!("Connecting to Redis...");
    let lock_store = RedisLockStore::connect(config.redis_url.expose_secret())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to connect to Redis");
            e
        })?;
    info!("Redis connection established");

    // Connect to Postgres and run migrations
    info!("Connecting to Postgres...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(config.database_url.expose_secret())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to connect to Postgres");
            e
        })?;
    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        error!(error = %e, "Failed to run database migrations");
        e
    })?;
    info!("Postgres connection established, migrations applied");

    // Repositories and collaborators
    let rooms: Arc<dyn RoomRepository> = Arc::new(PgRoomRepository::new(pool.clone()));
    let recordings: Arc<dyn RecordingRepository> =
        Arc::new(PgRecordingRepository::new(pool.clone()));
    let settings: Arc<dyn SettingsRepository> = Arc::new(PgSettingsRepository::new(pool.clone()));
    let media: Arc<dyn MediaEngine> = Arc::new(media_engine::NullMediaEngine);

    let mutex = Arc::new(MutexService::new(
        Arc::new(lock_store.clone()) as Arc<dyn LockStore>
    ));

    // Fleet-safe global settings initialization
    let global_settings =
        ensure_global_settings(&mutex, &settings, GlobalSettings::default()).await?;
    info!(
        recordings_enabled = global_settings.recordings_enabled,
        webhooks_enabled = global_settings.webhooks_enabled,
        "Global settings loaded"
    );

    // Connection monitor, scheduler and readiness mirror share one token tree
    let shutdown_token = tokio_util::sync::CancellationToken::new();

    let (store_health, monitor_handle) =
        lock_store.spawn_monitor(config.store_ping_interval, shutdown_token.child_token());

    let scheduler = TaskScheduler::new(Arc::clone(&mutex), store_health.clone());
    tokio::spawn(scheduler.clone().run());

    let health_state = Arc::new(HealthState::new());
    tokio::spawn(readiness_follows_store(
        Arc::clone(&health_state),
        store_health,
        shutdown_token.child_token(),
    ));

    // Lifecycle engines
    let room_lifecycle = Arc::new(RoomLifecycle::new(
        Arc::clone(&rooms),
        Arc::clone(&recordings),
        Arc::clone(&media),
        config.room_gc_config(),
    ));
    RoomLifecycle::register(&room_lifecycle, &scheduler, true)?;

    let recording_lifecycle = Arc::new(RecordingLifecycle::new(
        Arc::clone(&mutex),
        scheduler.clone(),
        Arc::clone(&recordings),
        Arc::clone(&media),
        config.recording_config(),
    ));
    RecordingLifecycle::register(&recording_lifecycle, true)?;

    info!("Lifecycle engines registered");

    // Health/metrics HTTP server
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let app = health_router(Arc::clone(&health_state))
        .merge(metrics_router)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    // Bind before spawning to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let health_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });
    info!(addr = %health_addr, "Health server started");

    // Wait for shutdown signal
    info!("Room Service running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");
    health_state.set_not_ready();
    scheduler.shutdown();
    shutdown_token.cancel();

    // Give tasks time to observe cancellation
    tokio::time::sleep(Duration::from_secs(2)).await;

    if let Err(e) = monitor_handle.await {
        warn!(error = %e, "Connection monitor join error");
    }

    info!("Room Service shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed: without them the
/// service cannot shut down gracefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

mod media_engine {
    //! Placeholder media engine binding.
    //!
    //! The real deployment wires the media provider's SDK here; every call
    //! site goes through the [`MediaEngine`] trait, so swapping this for
    //! the production client is a one-line change in `main`.

    use async_trait::async_trait;
    use room_service::errors::RoomServiceError;
    use room_service::media::MediaEngine;
    use tracing::warn;

    /// Media engine that treats every room as empty and rejects recording
    /// starts. Keeps the GC path fully functional in deployments without a
    /// media provider.
    pub struct NullMediaEngine;

    #[async_trait]
    impl MediaEngine for NullMediaEngine {
        async fn participant_count(&self, _room_id: &str) -> Result<u32, RoomServiceError> {
            Ok(0)
        }

        async fn delete_room(&self, _room_id: &str) -> Result<(), RoomServiceError> {
            Ok(())
        }

        async fn start_recording(&self, room_id: &str) -> Result<String, RoomServiceError> {
            warn!(room_id = %room_id, "No media engine configured, rejecting recording start");
            Err(RoomServiceError::Media(
                "no media engine configured".to_string(),
            ))
        }

        async fn stop_recording(
            &self,
            _room_id: &str,
            _recording_id: &str,
        ) -> Result<(), RoomServiceError> {
            Err(RoomServiceError::Media(
                "no media engine configured".to_string(),
            ))
        }
    }
}
