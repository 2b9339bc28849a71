//! Background task startup functions
//!
//! Contains the notification forwarder, the metrics reporter and the
//! startup restore.

use super::config::MetricsConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zapgate_core::MetricsCollector;
use zapgate_notifier::BackendNotifier;
use zapgate_whatsapp::{SessionEvent, SessionStore};

/// Forward store events to the backend until cancelled.
///
/// Each event is delivered on its own task so a slow backend never stalls
/// the subscription.
pub fn start_notification_forwarder(
    store: &SessionStore,
    notifier: Arc<BackendNotifier>,
    metrics: MetricsCollector,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut events = store.subscribe();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => match received {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Notification forwarder lagged, events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            let notifier = notifier.clone();
            let metrics = metrics.clone();
            tokio::spawn(async move { forward_event(&notifier, &metrics, event).await });
        }
        info!("Notification forwarder stopped");
    })
}

/// Map one store event onto its backend notification
pub async fn forward_event(
    notifier: &BackendNotifier,
    metrics: &MetricsCollector,
    event: SessionEvent,
) {
    match event {
        SessionEvent::StatusChanged {
            session_id,
            status,
            error,
            last_seen,
        } => {
            notifier
                .notify_status_change(&session_id, status, error.as_deref(), last_seen)
                .await;
        }
        SessionEvent::QrUpdated {
            session_id,
            qr,
            is_regeneration,
        } => {
            if is_regeneration {
                notifier.notify_qr_update(&session_id, &qr).await;
            } else {
                // First pairing QR stays local; the operator fetches it from the API.
                info!(session_id = %session_id, "Pairing QR ready");
            }
        }
        SessionEvent::SessionConnected { snapshot } => {
            if let Err(e) = notifier.notify_new_session_connected(&snapshot).await {
                error!(
                    session_id = %snapshot.session_id,
                    error = %e,
                    "Connected session has no phone number; not reported"
                );
            }
        }
        SessionEvent::MessageReceived { message } | SessionEvent::MessageSent { message } => {
            metrics.record_message();
            notifier.notify_message_received(&message).await;
        }
    }
}

/// Report metrics on a fixed interval and reset the hourly counter
pub fn start_metrics_reporter(
    config: &MetricsConfig,
    store: &SessionStore,
    notifier: Arc<BackendNotifier>,
    metrics: &MetricsCollector,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    if !config.enabled {
        info!("Metrics reporting disabled by configuration");
        return Vec::new();
    }

    let reset = metrics.spawn_reset_task(
        Duration::from_secs(config.reset_interval_secs.max(1)),
        cancel.clone(),
    );

    let interval = Duration::from_secs(config.report_interval_secs.max(1));
    let store = store.clone();
    let metrics = metrics.clone();
    let report = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (total, connected) = store.session_counts().await;
                    let report = metrics.report(total, connected);
                    debug!(total, connected, messages = report.message_count_last_hour, "Reporting metrics");
                    notifier.notify_metrics(&report).await;
                }
                _ = cancel.cancelled() => {
                    info!("Metrics reporter shutting down");
                    break;
                }
            }
        }
    });

    info!(
        report_secs = config.report_interval_secs,
        reset_secs = config.reset_interval_secs,
        "Metrics reporter started"
    );
    vec![reset, report]
}

/// Restore persisted sessions without blocking startup
pub fn start_restore(store: &SessionStore) -> JoinHandle<()> {
    let store = store.clone();
    tokio::spawn(async move {
        let summary = store.restore_all_sessions().await;
        for outcome in &summary.details {
            if let zapgate_whatsapp::RestoreOutcome::Failed { session_id, error } = outcome {
                warn!(session_id = %session_id, error = %error, "Session not restored");
            }
        }
        info!(
            restored = summary.restored,
            failed = summary.failed,
            "Startup restore finished"
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use serde_json::Value;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zapgate_notifier::{Environment, NotifierConfig};
    use zapgate_whatsapp::socket::{ConnectionUpdate, SocketEvent};
    use zapgate_whatsapp::SessionStatus;

    async fn backend() -> (MockServer, Arc<BackendNotifier>) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let config = NotifierConfig::new(server.uri(), Environment::Development)
            .with_max_attempts(1);
        let notifier = Arc::new(BackendNotifier::new(config).unwrap());
        (server, notifier)
    }

    async fn paths(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_only_regeneration_qr_is_reported() {
        let (server, notifier) = backend().await;
        let metrics = MetricsCollector::new();

        forward_event(
            &notifier,
            &metrics,
            SessionEvent::QrUpdated {
                session_id: "s1".into(),
                qr: "2@first".into(),
                is_regeneration: false,
            },
        )
        .await;
        assert!(paths(&server).await.is_empty());

        forward_event(
            &notifier,
            &metrics,
            SessionEvent::QrUpdated {
                session_id: "s1".into(),
                qr: "2@again".into(),
                is_regeneration: true,
            },
        )
        .await;
        assert_eq!(paths(&server).await, vec!["/sessions/qr-update"]);
    }

    #[tokio::test]
    async fn test_pairing_then_connect_reports_once() {
        let dir = tempfile::tempdir().unwrap();
        let (store, factory) = testing::store(dir.path());
        let (server, notifier) = backend().await;
        let metrics = MetricsCollector::new();
        let cancel = CancellationToken::new();
        let forwarder =
            start_notification_forwarder(&store, notifier, metrics.clone(), cancel.clone());

        store.create_session("s1", None, None, None).await.unwrap();
        let tx = factory.sender("s1");
        tx.send(SocketEvent::ConnectionUpdate(ConnectionUpdate {
            qr: Some("2@pairing".into()),
            connection: None,
        }))
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!paths(&server).await.contains(&"/sessions/qr-update".to_string()));

        testing::connected_session_update(&tx, "5491112223333").await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let requests = server.received_requests().await.unwrap();
        let connected: Vec<Value> = requests
            .iter()
            .filter(|r| r.url.path() == "/whatsapp_sessions/new-session-connected")
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0]["phone_number"], "5491112223333");
        assert_eq!(connected[0]["status"], "connected");
        assert!(!paths(&server).await.contains(&"/sessions/qr-update".to_string()));

        let status = store.get_session_status("s1").await.unwrap();
        assert_eq!(status.status, SessionStatus::Connected);

        cancel.cancel();
        forwarder.await.unwrap();
    }

    #[tokio::test]
    async fn test_sent_messages_are_counted_and_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let (store, factory) = testing::store(dir.path());
        let (server, notifier) = backend().await;
        let metrics = MetricsCollector::new();
        let cancel = CancellationToken::new();
        let _forwarder =
            start_notification_forwarder(&store, notifier, metrics.clone(), cancel.clone());

        testing::connected_session(&store, &factory, "s1", "5491100000000").await;
        store
            .send_text_message("s1", "5491144445555", "hola")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(metrics.message_count(), 1);
        assert!(paths(&server)
            .await
            .contains(&"/messages/received".to_string()));
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_metrics_reporter_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _factory) = testing::store(dir.path());
        let (_server, notifier) = backend().await;
        let config = MetricsConfig {
            enabled: false,
            ..MetricsConfig::default()
        };
        let handles = start_metrics_reporter(
            &config,
            &store,
            notifier,
            &MetricsCollector::new(),
            CancellationToken::new(),
        );
        assert!(handles.is_empty());
    }

    #[tokio::test]
    async fn test_metrics_reporter_posts_counts() {
        let dir = tempfile::tempdir().unwrap();
        let (store, factory) = testing::store(dir.path());
        let (server, notifier) = backend().await;
        testing::connected_session(&store, &factory, "s1", "5491100000000").await;

        let config = MetricsConfig {
            enabled: true,
            report_interval_secs: 1,
            reset_interval_secs: 3600,
        };
        let cancel = CancellationToken::new();
        let handles = start_metrics_reporter(
            &config,
            &store,
            notifier,
            &MetricsCollector::new(),
            cancel.clone(),
        );
        tokio::time::sleep(Duration::from_millis(1300)).await;
        cancel.cancel();
        for handle in handles {
            handle.await.unwrap();
        }

        let requests = server.received_requests().await.unwrap();
        let report: Value = requests
            .iter()
            .find(|r| r.url.path() == "/metrics")
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .unwrap();
        assert_eq!(report["totalSessions"], 1);
        assert_eq!(report["connectedSessions"], 1);
    }
}
