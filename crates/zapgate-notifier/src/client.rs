//! HTTP client for the external backend
//!
//! Every call goes through [`BackendNotifier::request`], which retries
//! non-2xx responses, timeouts and transport errors with a doubling delay.
//! The `notify_*` methods log and swallow delivery failures so that
//! message handling and status tracking never fail because the backend is
//! down. `notify_new_session_connected` is the exception: it refuses to
//! send a record without a phone number.

use crate::config::NotifierConfig;
use crate::error::{NotifierError, Result};
use crate::payload::{
    self, MessageReceived, NewSessionConnected, QrUpdate, StatusUpdate,
};
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use zapgate_core::{retry_with_backoff, MetricsReport, RetryConfig};
use zapgate_whatsapp::{NormalizedMessage, SessionSnapshot, SessionStatus};

const MAX_BODY_IN_ERROR: usize = 512;

/// Outbound notifier
#[derive(Clone)]
pub struct BackendNotifier {
    client: reqwest::Client,
    config: NotifierConfig,
    retry: RetryConfig,
}

impl std::fmt::Debug for BackendNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendNotifier")
            .field("base_url", &self.config.base_url)
            .field("environment", &self.config.environment)
            .field("has_api_key", &self.config.api_key.is_some())
            .finish()
    }
}

impl BackendNotifier {
    /// Build a notifier from its settings
    pub fn new(config: NotifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| NotifierError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let retry = RetryConfig::new()
            .with_max_attempts(config.max_attempts)
            .with_initial_delay(config.base_delay)
            .with_max_delay(Duration::from_secs(30))
            .with_backoff_multiplier(2.0);

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    /// Settings in use
    #[must_use]
    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Send `body` to `endpoint`, retrying until success or the attempt
    /// limit. Returns the last error when every attempt failed.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        method: Method,
    ) -> Result<()> {
        let url = self.config.url(endpoint);

        retry_with_backoff(
            &self.retry,
            |attempt| self.attempt(&url, body, method.clone(), attempt),
            |_| true,
        )
        .await
        .map_err(|e| NotifierError::Delivery {
            endpoint: endpoint.to_string(),
            attempts: e.attempts,
            message: e.last_error.to_string(),
        })
    }

    async fn attempt<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        method: Method,
        attempt: u32,
    ) -> Result<()> {
        let mut builder = self
            .client
            .request(method, url)
            .timeout(self.config.timeout)
            .json(body);

        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NotifierError::Timeout(self.config.timeout.as_millis() as u64)
            } else {
                NotifierError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        debug!(url = %url, status = %status, attempt, "Backend responded");

        if status.is_success() {
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        body.truncate(MAX_BODY_IN_ERROR);
        Err(NotifierError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn deliver<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) {
        if let Err(e) = self.request(endpoint, body, Method::POST).await {
            error!(endpoint = %endpoint, error = %e, "Backend notification dropped");
        }
    }

    /// Report a status change
    pub async fn notify_status_change(
        &self,
        session_id: &str,
        status: SessionStatus,
        error_message: Option<&str>,
        last_seen: Option<DateTime<Utc>>,
    ) {
        let body = StatusUpdate {
            session_id,
            status: status.as_str(),
            error_message,
            timestamp: Utc::now(),
            last_seen,
        };
        self.deliver(payload::STATUS_UPDATE, &body).await;
    }

    /// Forward a normalized message
    pub async fn notify_message_received(&self, message: &NormalizedMessage) {
        let body = MessageReceived::from_message(message);
        self.deliver(payload::MESSAGE_RECEIVED, &body).await;
    }

    /// Report a regenerated pairing QR
    pub async fn notify_qr_update(&self, session_id: &str, qr_data: &str) {
        let body = QrUpdate {
            session_id,
            qr_data,
            generated_at: Utc::now(),
        };
        self.deliver(payload::QR_UPDATE, &body).await;
    }

    /// Report a connected session.
    ///
    /// Fails with [`NotifierError::MissingPhoneNumber`] before any request
    /// when the snapshot has no phone number. Delivery failures are logged.
    pub async fn notify_new_session_connected(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let body = NewSessionConnected::from_snapshot(snapshot)
            .ok_or_else(|| NotifierError::MissingPhoneNumber(snapshot.session_id.clone()))?;

        info!(
            session_id = %snapshot.session_id,
            phone_number = %body.phone_number,
            "Reporting connected session"
        );
        self.deliver(payload::NEW_SESSION_CONNECTED, &body).await;
        Ok(())
    }

    /// Report process metrics
    pub async fn notify_metrics(&self, report: &MetricsReport) {
        if let Err(e) = self.request(payload::METRICS, report, Method::POST).await {
            warn!(error = %e, "Metrics report dropped");
        }
    }
}
