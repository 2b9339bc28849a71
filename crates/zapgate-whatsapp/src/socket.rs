//! Messaging-network collaborator.
//!
//! The session store never talks to the network directly. It asks a
//! [`SocketFactory`] for a connection and receives a socket handle plus an
//! ordered stream of [`SocketEvent`]s.

use crate::auth::AuthState;
use crate::classifier::MediaDownloader;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use zapgate_core::Result;

/// Parameters for opening one connection
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Session the connection belongs to
    pub session_id: String,
    /// Credential folder of the session
    pub auth_folder: PathBuf,
    /// Credentials loaded from the folder (empty for a fresh pairing)
    pub auth_state: AuthState,
    /// Protocol version to advertise, `None` for the library default
    pub version: Option<[u32; 3]>,
    /// QR codes are reported as events, never printed locally
    pub print_qr_in_terminal: bool,
}

/// Why the network closed a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// Device unlinked; credentials are no longer valid
    LoggedOut,
    /// Closed by the server
    ConnectionClosed,
    /// Network dropped
    ConnectionLost,
    /// Another client took over the session
    ConnectionReplaced,
    /// Server asked for a fresh connection
    RestartRequired,
    /// No status reported
    TimedOut,
    /// Any other status code
    Other(u16),
}

impl DisconnectReason {
    /// Map a close status code
    #[must_use]
    pub fn from_status_code(code: Option<u16>) -> Self {
        match code {
            Some(401) => Self::LoggedOut,
            Some(428) => Self::ConnectionClosed,
            Some(408) => Self::ConnectionLost,
            Some(440) => Self::ConnectionReplaced,
            Some(515) => Self::RestartRequired,
            Some(code) => Self::Other(code),
            None => Self::TimedOut,
        }
    }

    /// Permanent logout; reconnecting is pointless
    #[must_use]
    pub fn is_logged_out(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

/// Connection lifecycle reported by the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress
    Connecting,
    /// Connection is usable
    Open {
        /// Confirmed user JID, e.g. `5491112223333:7@s.whatsapp.net`
        user_id: Option<String>,
    },
    /// Connection ended
    Close {
        /// Close reason
        reason: DisconnectReason,
    },
}

/// A `connection.update` event. Either field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionUpdate {
    /// Fresh pairing QR payload
    pub qr: Option<String>,
    /// New connection state
    pub connection: Option<ConnectionState>,
}

/// Changed signal key material. `value: None` means the key was deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEntry {
    /// Key name, e.g. `pre-key-12`
    pub name: String,
    /// New value
    pub value: Option<Value>,
}

/// Origin of a message upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertKind {
    /// Live message
    Notify,
    /// History sync or echo of an older message
    Append,
}

/// Event emitted by an open connection, delivered in arrival order
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// Connection state or QR change
    ConnectionUpdate(ConnectionUpdate),
    /// Primary credentials changed and must be persisted
    CredsUpdate(Value),
    /// Signal keys changed and must be persisted
    KeysUpdate(Vec<KeyEntry>),
    /// New messages
    MessagesUpsert {
        /// Raw protocol messages
        messages: Vec<Value>,
        /// Upsert origin
        kind: UpsertKind,
    },
}

/// Result of a successful send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    /// Network message id
    pub message_id: String,
    /// Server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Handle to one open connection
#[async_trait]
pub trait WaSocket: MediaDownloader {
    /// Send a text body to a formatted user JID
    async fn send_text(&self, jid: &str, text: &str) -> Result<SentMessage>;

    /// Check whether a JID has an account. Returns the canonical JID if so.
    async fn on_whatsapp(&self, jid: &str) -> Result<Option<String>>;

    /// Unlink the device
    async fn logout(&self) -> Result<()>;

    /// Close the transport without unlinking
    async fn close(&self);
}

/// An opened connection
pub struct SocketConnection {
    /// Socket handle
    pub socket: Arc<dyn WaSocket>,
    /// Ordered event stream; ends when the connection is gone for good
    pub events: mpsc::Receiver<SocketEvent>,
}

impl std::fmt::Debug for SocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketConnection").finish_non_exhaustive()
    }
}

/// Opens connections
#[async_trait]
pub trait SocketFactory: Send + Sync {
    /// Open a connection. Errors here are setup failures.
    async fn open(&self, options: SocketOptions) -> Result<SocketConnection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_reason_mapping() {
        assert_eq!(
            DisconnectReason::from_status_code(Some(401)),
            DisconnectReason::LoggedOut
        );
        assert!(DisconnectReason::from_status_code(Some(401)).is_logged_out());
        assert_eq!(
            DisconnectReason::from_status_code(Some(515)),
            DisconnectReason::RestartRequired
        );
        assert_eq!(
            DisconnectReason::from_status_code(Some(503)),
            DisconnectReason::Other(503)
        );
        assert_eq!(
            DisconnectReason::from_status_code(None),
            DisconnectReason::TimedOut
        );
        assert!(!DisconnectReason::ConnectionLost.is_logged_out());
    }
}
