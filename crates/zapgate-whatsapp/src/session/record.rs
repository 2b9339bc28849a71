//! In-memory record of one managed account.

use super::state::{SessionState, SessionStatus};
use crate::socket::WaSocket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Mutable state of one session, owned by the store map.
pub(crate) struct SessionRecord {
    pub session_id: String,
    /// Provisional until the network confirms it on open
    pub phone_number: Option<String>,
    pub auth_folder_path: PathBuf,
    pub server_port: Option<u16>,
    pub state: SessionState,
    pub qr_code_data: Option<String>,
    pub whatsapp_user_id: Option<String>,
    pub connected_user_phone_number: Option<String>,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub is_intentionally_disconnecting: bool,
    pub socket: Option<Arc<dyn WaSocket>>,
    /// Bumped on every connect; events from older sockets are ignored
    pub generation: u64,
    /// Stops the event task of the current generation
    pub events_cancel: CancellationToken,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn new(
        session_id: String,
        phone_number: Option<String>,
        auth_folder_path: PathBuf,
        server_port: Option<u16>,
        max_reconnect_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            phone_number,
            auth_folder_path,
            server_port,
            state: SessionState::Disconnected,
            qr_code_data: None,
            whatsapp_user_id: None,
            connected_user_phone_number: None,
            reconnect_attempts: 0,
            max_reconnect_attempts,
            is_intentionally_disconnecting: false,
            socket: None,
            generation: 0,
            events_cancel: CancellationToken::new(),
            created_at: now,
            updated_at: now,
            last_seen: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            phone_number: self.phone_number.clone(),
            status: self.status(),
            error: self.state.error_reason().map(str::to_string),
            has_qr_code: self.qr_code_data.is_some(),
            whatsapp_user_id: self.whatsapp_user_id.clone(),
            connected_user_phone_number: self.connected_user_phone_number.clone(),
            reconnect_attempts: self.reconnect_attempts,
            max_reconnect_attempts: self.max_reconnect_attempts,
            auth_folder_path: self.auth_folder_path.display().to_string(),
            server_port: self.server_port,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_seen: self.last_seen,
        }
    }
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("has_socket", &self.socket.is_some())
            .finish_non_exhaustive()
    }
}

/// Read-only projection of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session id
    pub session_id: String,
    /// Confirmed (or provisional) phone number
    pub phone_number: Option<String>,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Setup failure reason when `status == error`
    pub error: Option<String>,
    /// Waiting for a QR scan
    pub has_qr_code: bool,
    /// Network-confirmed user JID
    pub whatsapp_user_id: Option<String>,
    /// Phone number extracted from the confirmed JID
    pub connected_user_phone_number: Option<String>,
    /// Reconnects scheduled since the last successful open
    pub reconnect_attempts: u32,
    /// Reconnect limit
    pub max_reconnect_attempts: u32,
    /// Credential folder
    pub auth_folder_path: String,
    /// Port of the owning server process, if any
    pub server_port: Option<u16>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation
    pub updated_at: DateTime<Utc>,
    /// Last disconnect or connect
    pub last_seen: Option<DateTime<Utc>>,
}
