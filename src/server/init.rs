//! Server initialization and run loop

use super::background_tasks::{
    start_metrics_reporter, start_notification_forwarder, start_restore,
};
use super::config::AppConfig;
use super::validation::validate_production_config;
use crate::api::{api_router, AppState};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use zapgate_core::{shutdown_signal_with_controller, MetricsCollector, ShutdownController};
use zapgate_notifier::BackendNotifier;
use zapgate_whatsapp::{BridgeSocketFactory, SessionStore};

/// Run the orchestrator until a shutdown signal arrives
pub async fn run(config: AppConfig) -> Result<()> {
    info!("Starting Zapgate v{}", env!("CARGO_PKG_VERSION"));
    validate_production_config(&config)?;

    let bridge = Arc::new(
        BridgeSocketFactory::new(config.whatsapp.bridge_config())
            .context("Failed to create bridge client")?,
    );
    if bridge.config().callback_url.is_none() {
        warn!("No bridge callback_url configured; the bridge must be set up to post to /api/v1/webhooks/bridge/:session_id");
    }
    info!(bridge_url = %bridge.config().bridge_url, "Bridge socket factory initialized");

    let store = SessionStore::new(config.store_config(), bridge.clone());
    info!(
        auth_base_dir = %config.whatsapp.auth_base_dir,
        max_reconnect_attempts = config.whatsapp.max_reconnect_attempts,
        "Session store initialized"
    );

    let notifier = Arc::new(
        BackendNotifier::new(config.backend.notifier_config())
            .context("Failed to create backend notifier")?,
    );
    info!(
        base_url = %config.backend.base_url,
        environment = ?config.backend.environment,
        "Backend notifier initialized"
    );

    let shutdown_controller = ShutdownController::new();
    let metrics = MetricsCollector::new();

    let mut tasks = vec![start_notification_forwarder(
        &store,
        notifier.clone(),
        metrics.clone(),
        shutdown_controller.token(),
    )];
    tasks.extend(start_metrics_reporter(
        &config.metrics,
        &store,
        notifier,
        &metrics,
        shutdown_controller.token(),
    ));
    let restore = start_restore(&store);

    let state = AppState {
        store: store.clone(),
        bridge,
        metrics,
    };
    let app = api_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_controller(shutdown_controller.clone()))
        .await
        .context("HTTP server error")?;

    // A signal-free exit (listener error) still has to stop background work.
    shutdown_controller.shutdown();
    restore.abort();

    info!("Closing sessions...");
    store.shutdown_all().await;

    let task_timeout = tokio::time::Duration::from_secs(5);
    for handle in tasks {
        match tokio::time::timeout(task_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Background task error: {}", e),
            Err(_) => warn!("Background task shutdown timeout, aborting"),
        }
    }

    info!("Zapgate shutdown complete");
    Ok(())
}
