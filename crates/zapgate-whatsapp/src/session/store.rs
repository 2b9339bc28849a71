//! Session Store
//!
//! Owns the `session_id → SessionRecord` map and every lifecycle transition.
//! Each open connection gets one event task that drains the socket's event
//! stream in order, so connection updates, credential writes and messages of
//! one session never interleave. The map lock is never held across network
//! or filesystem I/O.

use super::events::SessionEvent;
use super::record::{SessionRecord, SessionSnapshot};
use super::state::SessionStatus;
use crate::auth::{self, AuthState};
use crate::classifier::{classify, enrich_image, TranscodeOptions};
use crate::filter;
use crate::jid;
use crate::message::{NormalizedMessage, SessionIdentity};
use crate::raw::RawMessage;
use crate::socket::{
    ConnectionState, ConnectionUpdate, DisconnectReason, SentMessage, SocketConnection,
    SocketEvent, SocketFactory, SocketOptions, UpsertKind, WaSocket,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Instrument};
use zapgate_core::{Error, EventBus, Result};

/// Session store settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Parent directory of all session credential folders
    pub auth_base_dir: PathBuf,
    /// Restore persisted sessions at startup
    pub auto_restore: bool,
    /// Automatic reconnects allowed after a successful lifecycle
    pub max_reconnect_attempts: u32,
    /// Delay before an automatic reconnect
    pub reconnect_delay: Duration,
    /// Delay between restart teardown and reconnect
    pub restart_delay: Duration,
    /// Sessions restored concurrently per batch
    pub restore_concurrency: usize,
    /// Protocol version passed to the socket factory
    pub version: Option<[u32; 3]>,
    /// Port of this process, used when a session is created without one
    pub server_port: Option<u16>,
    /// Inline image transcoding bounds
    pub transcode: TranscodeOptions,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            auth_base_dir: PathBuf::from("auth_sessions"),
            auto_restore: true,
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(5),
            restart_delay: Duration::from_secs(2),
            restore_concurrency: 3,
            version: None,
            server_port: None,
            transcode: TranscodeOptions::default(),
        }
    }
}

/// Outcome of one best-effort teardown step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum TeardownStep {
    /// Step succeeded
    Done,
    /// Nothing to do
    Skipped,
    /// Step failed; teardown continued
    Failed(String),
}

/// What happened while removing a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// Network logout
    pub logout: TeardownStep,
    /// Recursive deletion of the credential folder
    pub auth_folder: TeardownStep,
}

/// Result of restoring one persisted session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RestoreOutcome {
    /// Socket opened with the persisted credentials
    Restored {
        /// Session id
        session_id: String,
    },
    /// Restore failed; the record was not kept
    Failed {
        /// Session id
        session_id: String,
        /// Failure description
        error: String,
    },
}

impl RestoreOutcome {
    /// Session id
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Restored { session_id } | Self::Failed { session_id, .. } => session_id,
        }
    }
}

/// Aggregate of a bulk restore
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    /// Sessions restored
    pub restored: usize,
    /// Sessions that failed
    pub failed: usize,
    /// Per-session outcomes
    pub details: Vec<RestoreOutcome>,
}

struct Inner {
    config: StoreConfig,
    factory: Arc<dyn SocketFactory>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
    events: EventBus<SessionEvent>,
    cancel: CancellationToken,
}

/// Keyed collection of sessions. Cheap to clone.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create an empty store
    pub fn new(config: StoreConfig, factory: Arc<dyn SocketFactory>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                factory,
                sessions: RwLock::new(HashMap::new()),
                events: EventBus::default(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Store settings
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Event bus the store publishes to
    pub fn events(&self) -> &EventBus<SessionEvent> {
        &self.inner.events
    }

    /// Subscribe to store events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    // ---- lifecycle ----

    /// Register a session and connect it. On connect failure the record is
    /// dropped and the error returned.
    #[instrument(skip(self, phone_number, auth_folder_path), fields(session_id = %session_id))]
    pub async fn create_session(
        &self,
        session_id: &str,
        phone_number: Option<String>,
        auth_folder_path: Option<PathBuf>,
        server_port: Option<u16>,
    ) -> Result<SessionSnapshot> {
        auth::validate_session_id(session_id)?;
        let folder = match auth_folder_path {
            Some(folder) => folder,
            None => auth::session_folder(&self.inner.config.auth_base_dir, session_id)?,
        };
        let server_port = server_port.or(self.inner.config.server_port);

        {
            let mut sessions = self.inner.sessions.write().await;
            if sessions.contains_key(session_id) {
                return Err(Error::DuplicateSession(session_id.to_string()));
            }
            sessions.insert(
                session_id.to_string(),
                SessionRecord::new(
                    session_id.to_string(),
                    phone_number,
                    folder,
                    server_port,
                    self.inner.config.max_reconnect_attempts,
                ),
            );
        }
        info!("Session created");

        if let Err(e) = self.connect_session(session_id).await {
            self.inner.sessions.write().await.remove(session_id);
            return Err(e);
        }

        self.get_session_status(session_id)
            .await
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    /// Open a network connection for an existing record.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn connect_session(&self, session_id: &str) -> Result<()> {
        let (folder, generation, cancel, last_seen) = {
            let mut sessions = self.inner.sessions.write().await;
            let record = sessions
                .get_mut(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
            record.state.begin_connect(session_id)?;
            record.generation += 1;
            record.events_cancel.cancel();
            record.events_cancel = self.inner.cancel.child_token();
            record.is_intentionally_disconnecting = false;
            record.touch();
            (
                record.auth_folder_path.clone(),
                record.generation,
                record.events_cancel.clone(),
                record.last_seen,
            )
        };
        self.publish_status(session_id, SessionStatus::Connecting, None, last_seen);

        let connection = match self.open_socket(session_id, &folder).await {
            Ok(connection) => connection,
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, "Session setup failed");
                let last_seen = {
                    let mut sessions = self.inner.sessions.write().await;
                    match sessions.get_mut(session_id) {
                        Some(record) if record.generation == generation => {
                            record.state.fail(session_id, message.clone())?;
                            record.touch();
                            record.last_seen
                        }
                        _ => None,
                    }
                };
                self.publish_status(
                    session_id,
                    SessionStatus::Error,
                    Some(message.clone()),
                    last_seen,
                );
                return Err(Error::Setup {
                    session_id: session_id.to_string(),
                    message,
                });
            }
        };

        let SocketConnection { socket, events } = connection;
        let attached = {
            let mut sessions = self.inner.sessions.write().await;
            match sessions.get_mut(session_id) {
                Some(record) if record.generation == generation => {
                    record.socket = Some(Arc::clone(&socket));
                    true
                }
                _ => false,
            }
        };
        if !attached {
            debug!("Session changed while connecting, closing new socket");
            socket.close().await;
            return Ok(());
        }

        self.spawn_event_loop(session_id.to_string(), generation, cancel, socket, events);
        debug!("Socket opened");
        Ok(())
    }

    async fn open_socket(&self, session_id: &str, folder: &Path) -> Result<SocketConnection> {
        tokio::fs::create_dir_all(folder).await?;
        let auth_state = AuthState::load(folder).await?;
        self.inner
            .factory
            .open(SocketOptions {
                session_id: session_id.to_string(),
                auth_folder: folder.to_path_buf(),
                auth_state,
                version: self.inner.config.version,
                print_qr_in_terminal: false,
            })
            .await
    }

    /// Remove a session, logging out and deleting its credentials.
    /// Returns `false` if it did not exist.
    pub async fn remove_session(&self, session_id: &str, notify_backend: bool) -> bool {
        self.teardown_session(session_id, notify_backend)
            .await
            .is_some()
    }

    /// [`remove_session`](Self::remove_session) with the outcome of each
    /// best-effort step.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn teardown_session(
        &self,
        session_id: &str,
        notify_backend: bool,
    ) -> Option<TeardownReport> {
        let (socket, folder) = {
            let mut sessions = self.inner.sessions.write().await;
            let record = sessions.get_mut(session_id)?;
            record.is_intentionally_disconnecting = true;
            record.events_cancel.cancel();
            (record.socket.clone(), record.auth_folder_path.clone())
        };

        let logout = match &socket {
            Some(socket) => match socket.logout().await {
                Ok(()) => TeardownStep::Done,
                Err(e) => {
                    warn!(error = %e, "Logout failed, continuing teardown");
                    TeardownStep::Failed(e.to_string())
                }
            },
            None => TeardownStep::Skipped,
        };

        let auth_folder = match auth::remove_auth_folder(&folder).await {
            Ok(()) => TeardownStep::Done,
            Err(e) => {
                warn!(error = %e, path = %folder.display(), "Failed to delete auth folder");
                TeardownStep::Failed(e.to_string())
            }
        };

        let last_seen = self
            .inner
            .sessions
            .write()
            .await
            .remove(session_id)
            .and_then(|record| record.last_seen);

        if let Some(socket) = socket {
            socket.close().await;
        }

        if notify_backend {
            self.publish_status(session_id, SessionStatus::Disconnected, None, last_seen);
        }

        info!(?logout, ?auth_folder, "Session removed");
        Some(TeardownReport {
            logout,
            auth_folder,
        })
    }

    /// Log out, reset to disconnected and reconnect after the restart delay.
    /// Credentials and the record are kept.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn restart_session(&self, session_id: &str) -> Result<()> {
        let socket = {
            let mut sessions = self.inner.sessions.write().await;
            let record = sessions
                .get_mut(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
            record.is_intentionally_disconnecting = true;
            // in-flight connects must not attach to the restarted record
            record.generation += 1;
            record.events_cancel.cancel();
            record.socket.take()
        };

        if let Some(socket) = socket {
            if let Err(e) = socket.logout().await {
                warn!(error = %e, "Logout during restart failed");
            }
            socket.close().await;
        }

        let (generation, last_seen) = {
            let mut sessions = self.inner.sessions.write().await;
            let record = sessions
                .get_mut(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
            record.state.reset();
            record.qr_code_data = None;
            record.reconnect_attempts = 0;
            record.touch();
            (record.generation, record.last_seen)
        };

        self.publish_status(session_id, SessionStatus::Disconnected, None, last_seen);
        info!(
            delay_ms = self.inner.config.restart_delay.as_millis() as u64,
            "Session restarting"
        );
        self.schedule_reconnect(session_id, generation, self.inner.config.restart_delay);
        Ok(())
    }

    /// Close every socket without logging out so credentials survive for the
    /// next restore. Pending reconnects and event loops are cancelled.
    pub async fn shutdown_all(&self) {
        self.inner.cancel.cancel();

        let sockets: Vec<(String, Arc<dyn WaSocket>)> = {
            let mut sessions = self.inner.sessions.write().await;
            sessions
                .values_mut()
                .filter_map(|record| {
                    record.is_intentionally_disconnecting = true;
                    record
                        .socket
                        .take()
                        .map(|socket| (record.session_id.clone(), socket))
                })
                .collect()
        };

        info!(count = sockets.len(), "Closing all session sockets");
        join_all(sockets.iter().map(|(id, socket)| async move {
            socket.close().await;
            debug!(session_id = %id, "Socket closed");
        }))
        .await;
    }

    // ---- queries ----

    /// Snapshot of one session
    pub async fn get_session_status(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.inner
            .sessions
            .read()
            .await
            .get(session_id)
            .map(SessionRecord::snapshot)
    }

    /// Snapshots of all sessions, ordered by id
    pub async fn get_all_sessions_status(&self) -> Vec<SessionSnapshot> {
        let mut all: Vec<SessionSnapshot> = self
            .inner
            .sessions
            .read()
            .await
            .values()
            .map(SessionRecord::snapshot)
            .collect();
        all.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        all
    }

    /// `(total, connected)` session counts
    pub async fn session_counts(&self) -> (usize, usize) {
        let sessions = self.inner.sessions.read().await;
        let connected = sessions
            .values()
            .filter(|r| r.status() == SessionStatus::Connected)
            .count();
        (sessions.len(), connected)
    }

    /// Current pairing QR, if any
    pub async fn get_qr_code(&self, session_id: &str) -> Result<Option<String>> {
        self.inner
            .sessions
            .read()
            .await
            .get(session_id)
            .map(|record| record.qr_code_data.clone())
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    // ---- send path ----

    /// Send a text message and publish the locally built `MessageSent` event.
    #[instrument(skip(self, text), fields(session_id = %session_id))]
    pub async fn send_text_message(
        &self,
        session_id: &str,
        to: &str,
        text: &str,
    ) -> Result<SentMessage> {
        let (socket, phone_number, user_jid) = {
            let sessions = self.inner.sessions.read().await;
            let record = sessions
                .get(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
            let socket = match (&record.socket, record.status()) {
                (Some(socket), SessionStatus::Connected) => Arc::clone(socket),
                _ => return Err(Error::NotConnected(session_id.to_string())),
            };
            (
                socket,
                record.phone_number.clone(),
                record.whatsapp_user_id.clone(),
            )
        };

        let target = jid::to_user_jid(to);
        let target = socket
            .on_whatsapp(&target)
            .await?
            .ok_or_else(|| Error::NoWhatsAppAccount(to.to_string()))?;

        let sent = socket.send_text(&target, text).await?;
        info!(message_id = %sent.message_id, "Message sent");

        let message = NormalizedMessage::outgoing_text(
            sent.message_id.clone(),
            &target,
            text,
            sent.timestamp,
            SessionIdentity {
                session_id,
                phone_number: phone_number.as_deref(),
                user_jid: user_jid.as_deref(),
            },
        );
        self.inner.events.publish(SessionEvent::MessageSent {
            message: Box::new(message),
        });
        Ok(sent)
    }

    // ---- restore ----

    /// Session ids with valid persisted credentials under the base directory
    pub async fn detect_existing_sessions(&self) -> Result<Vec<String>> {
        auth::detect_sessions(&self.inner.config.auth_base_dir).await
    }

    /// Re-create a session from its persisted credentials. Never errors;
    /// failures are reported in the outcome.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn restore_session(&self, session_id: &str) -> RestoreOutcome {
        let result = match auth::session_folder(&self.inner.config.auth_base_dir, session_id) {
            Err(e) => Err(e),
            Ok(folder) if auth::has_valid_credentials(&folder).await => self
                .create_session(session_id, None, Some(folder), None)
                .await
                .map(|_| ()),
            Ok(_) => Err(Error::Restore {
                session_id: session_id.to_string(),
                message: "no valid credentials".to_string(),
            }),
        };

        match result {
            Ok(()) => {
                info!("Session restored");
                RestoreOutcome::Restored {
                    session_id: session_id.to_string(),
                }
            }
            Err(e) => {
                warn!(error = %e, "Session restore failed");
                RestoreOutcome::Failed {
                    session_id: session_id.to_string(),
                    error: e.to_string(),
                }
            }
        }
    }

    /// Restore every detected session in sequential batches of
    /// `restore_concurrency`.
    pub async fn restore_all_sessions(&self) -> RestoreSummary {
        if !self.inner.config.auto_restore {
            info!("Auto-restore disabled");
            return RestoreSummary::default();
        }

        let ids = match self.detect_existing_sessions().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Failed to scan auth directory");
                return RestoreSummary::default();
            }
        };
        if ids.is_empty() {
            info!("No persisted sessions to restore");
            return RestoreSummary::default();
        }

        info!(count = ids.len(), "Restoring persisted sessions");
        let mut summary = RestoreSummary::default();
        for batch in ids.chunks(self.inner.config.restore_concurrency.max(1)) {
            let outcomes = join_all(batch.iter().map(|id| self.restore_session(id))).await;
            for outcome in outcomes {
                match outcome {
                    RestoreOutcome::Restored { .. } => summary.restored += 1,
                    RestoreOutcome::Failed { .. } => summary.failed += 1,
                }
                summary.details.push(outcome);
            }
        }

        info!(
            restored = summary.restored,
            failed = summary.failed,
            "Session restore complete"
        );
        summary
    }

    // ---- socket events ----

    fn spawn_event_loop(
        &self,
        session_id: String,
        generation: u64,
        cancel: CancellationToken,
        socket: Arc<dyn WaSocket>,
        mut events: mpsc::Receiver<SocketEvent>,
    ) {
        let store = self.clone();
        let span = tracing::info_span!("session_events", session_id = %session_id, generation);
        tokio::spawn(
            async move {
                loop {
                    let event = tokio::select! {
                        _ = cancel.cancelled() => break,
                        event = events.recv() => match event {
                            Some(event) => event,
                            None => break,
                        },
                    };
                    if !store.is_current(&session_id, generation).await {
                        debug!("Socket superseded, dropping event stream");
                        break;
                    }
                    let closed = matches!(
                        &event,
                        SocketEvent::ConnectionUpdate(ConnectionUpdate {
                            connection: Some(ConnectionState::Close { .. }),
                            ..
                        })
                    );
                    if let Err(e) = store
                        .handle_socket_event(&session_id, generation, &socket, event)
                        .await
                    {
                        if matches!(e, Error::MissingIdentity(_)) {
                            error!(error = %e, "Connected session has no phone number");
                        } else {
                            warn!(error = %e, "Failed to handle socket event");
                        }
                    }
                    if closed {
                        break;
                    }
                }
                debug!("Socket event loop finished");
            }
            .instrument(span),
        );
    }

    async fn is_current(&self, session_id: &str, generation: u64) -> bool {
        self.inner
            .sessions
            .read()
            .await
            .get(session_id)
            .is_some_and(|record| record.generation == generation)
    }

    async fn handle_socket_event(
        &self,
        session_id: &str,
        generation: u64,
        socket: &Arc<dyn WaSocket>,
        event: SocketEvent,
    ) -> Result<()> {
        match event {
            SocketEvent::ConnectionUpdate(update) => {
                if let Some(qr) = update.qr {
                    self.handle_qr(session_id, generation, qr).await;
                }
                match update.connection {
                    Some(ConnectionState::Open { user_id }) => {
                        self.handle_open(session_id, generation, user_id).await
                    }
                    Some(ConnectionState::Close { reason }) => {
                        self.handle_close(session_id, generation, reason).await;
                        Ok(())
                    }
                    Some(ConnectionState::Connecting) | None => Ok(()),
                }
            }
            SocketEvent::CredsUpdate(creds) => {
                let folder = self.auth_folder(session_id).await?;
                auth::persist_creds(&folder, &creds).await
            }
            SocketEvent::KeysUpdate(keys) => {
                let folder = self.auth_folder(session_id).await?;
                auth::persist_keys(&folder, &keys).await
            }
            SocketEvent::MessagesUpsert { messages, kind } => {
                if kind != UpsertKind::Notify {
                    debug!(count = messages.len(), ?kind, "Skipping non-live upsert");
                    return Ok(());
                }
                for value in messages {
                    self.handle_incoming(session_id, socket, value).await;
                }
                Ok(())
            }
        }
    }

    async fn auth_folder(&self, session_id: &str) -> Result<PathBuf> {
        self.inner
            .sessions
            .read()
            .await
            .get(session_id)
            .map(|record| record.auth_folder_path.clone())
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    async fn handle_qr(&self, session_id: &str, generation: u64, qr: String) {
        let is_regeneration = {
            let mut sessions = self.inner.sessions.write().await;
            let Some(record) = sessions
                .get_mut(session_id)
                .filter(|r| r.generation == generation)
            else {
                return;
            };
            if record.status() == SessionStatus::Connected {
                debug!("Ignoring QR for connected session");
                return;
            }
            record.qr_code_data = Some(qr.clone());
            record.touch();
            record.phone_number.is_some()
        };

        info!(is_regeneration, "QR code updated");
        self.inner.events.publish(SessionEvent::QrUpdated {
            session_id: session_id.to_string(),
            qr,
            is_regeneration,
        });
    }

    async fn handle_open(
        &self,
        session_id: &str,
        generation: u64,
        user_id: Option<String>,
    ) -> Result<()> {
        let snapshot = {
            let mut sessions = self.inner.sessions.write().await;
            let Some(record) = sessions
                .get_mut(session_id)
                .filter(|r| r.generation == generation)
            else {
                return Ok(());
            };
            record.state.open(session_id, user_id.clone())?;
            if let Some(user_id) = user_id {
                let number = jid::extract_number(&user_id);
                record.phone_number = Some(number.clone());
                record.connected_user_phone_number = Some(number);
                record.whatsapp_user_id = Some(user_id);
            }
            record.qr_code_data = None;
            record.reconnect_attempts = 0;
            record.last_seen = Some(Utc::now());
            record.touch();
            record.snapshot()
        };

        info!(phone_number = ?snapshot.phone_number, "Session connected");
        self.publish_status(
            session_id,
            SessionStatus::Connected,
            None,
            snapshot.last_seen,
        );

        if snapshot.phone_number.is_none() {
            return Err(Error::MissingIdentity(session_id.to_string()));
        }
        self.inner
            .events
            .publish(SessionEvent::SessionConnected { snapshot });
        Ok(())
    }

    async fn handle_close(&self, session_id: &str, generation: u64, reason: DisconnectReason) {
        enum Next {
            Reconnect { attempt: u32, generation: u64 },
            Stop,
        }

        let (next, notify, last_seen) = {
            let mut sessions = self.inner.sessions.write().await;
            let Some(record) = sessions
                .get_mut(session_id)
                .filter(|r| r.generation == generation)
            else {
                return;
            };
            let now = Utc::now();
            record.last_seen = Some(now);
            record.socket = None;
            record.touch();
            if let Err(e) = record.state.close(session_id) {
                debug!(error = %e, "Close on inactive session");
            }

            let intentional = record.is_intentionally_disconnecting;
            let next = if !intentional
                && !reason.is_logged_out()
                && record.reconnect_attempts < record.max_reconnect_attempts
            {
                record.reconnect_attempts += 1;
                Next::Reconnect {
                    attempt: record.reconnect_attempts,
                    generation: record.generation,
                }
            } else {
                record.qr_code_data = None;
                Next::Stop
            };
            (next, !intentional, now)
        };

        if notify {
            self.publish_status(
                session_id,
                SessionStatus::Disconnected,
                None,
                Some(last_seen),
            );
        }

        match next {
            Next::Reconnect {
                attempt,
                generation,
            } => {
                info!(?reason, attempt, "Connection closed, scheduling reconnect");
                self.schedule_reconnect(session_id, generation, self.inner.config.reconnect_delay);
            }
            Next::Stop => {
                info!(?reason, "Connection closed, not reconnecting");
            }
        }
    }

    async fn handle_incoming(&self, session_id: &str, socket: &Arc<dyn WaSocket>, value: Value) {
        let raw: RawMessage = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "Unparseable message payload");
                return;
            }
        };
        if let Some(reason) = filter::rejection_reason(&raw) {
            debug!(?reason, message_id = ?raw.id(), "Message filtered");
            return;
        }

        let mut classified = classify(&raw);
        enrich_image(
            &mut classified,
            &value,
            &**socket,
            self.inner.config.transcode,
        )
        .await;

        let (phone_number, user_jid) = {
            let sessions = self.inner.sessions.read().await;
            let Some(record) = sessions.get(session_id) else {
                return;
            };
            (record.phone_number.clone(), record.whatsapp_user_id.clone())
        };

        let identity = SessionIdentity {
            session_id,
            phone_number: phone_number.as_deref(),
            user_jid: user_jid.as_deref(),
        };
        let Some(message) = NormalizedMessage::from_raw(&raw, value, classified, identity) else {
            return;
        };

        debug!(
            message_id = %message.message_id,
            message_type = %message.message_type,
            "Message received"
        );
        self.inner.events.publish(SessionEvent::MessageReceived {
            message: Box::new(message),
        });
    }

    fn schedule_reconnect(&self, session_id: &str, generation: u64, delay: Duration) {
        let store = self.clone();
        let session_id = session_id.to_string();
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if !store.is_current(&session_id, generation).await {
                debug!(session_id = %session_id, "Reconnect superseded");
                return;
            }
            if let Err(e) = store.connect_session(&session_id).await {
                warn!(session_id = %session_id, error = %e, "Reconnect failed");
            }
        });
    }

    fn publish_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        error: Option<String>,
        last_seen: Option<DateTime<Utc>>,
    ) {
        self.inner.events.publish(SessionEvent::StatusChanged {
            session_id: session_id.to_string(),
            status,
            error,
            last_seen,
        });
    }
}
