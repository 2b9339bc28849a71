use crate::socket::{
    ConnectionState, ConnectionUpdate, DisconnectReason, KeyEntry, SocketEvent, UpsertKind,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Body of `POST /sessions/{id}/connect`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest<'a> {
    /// Persisted credentials, `None` for a fresh pairing
    pub creds: Option<&'a Value>,
    /// Persisted signal keys
    pub keys: &'a HashMap<String, Value>,
    /// Protocol version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<[u32; 3]>,
    /// Always false; QR codes come back as events
    pub print_qr_in_terminal: bool,
    /// Where the bridge posts this session's events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Generic bridge acknowledgement
#[derive(Debug, Deserialize)]
pub struct AckResponse {
    /// Whether the bridge accepted the request
    pub success: bool,
    /// Error description on failure
    pub error: Option<String>,
}

/// Send message response
#[derive(Debug, Deserialize)]
pub struct SendResponse {
    /// Whether the message was sent successfully.
    pub success: bool,
    /// WhatsApp message ID if sent.
    #[serde(rename = "messageId")]
    pub message_id: Option<String>,
    /// Server timestamp in seconds
    pub timestamp: Option<i64>,
    /// Error description if sending failed.
    pub error: Option<String>,
}

/// Existence check response
#[derive(Debug, Deserialize)]
pub struct ExistsResponse {
    /// The number has an account
    pub exists: bool,
    /// Canonical JID when it exists
    pub jid: Option<String>,
}

/// Media download response
#[derive(Debug, Deserialize)]
pub struct MediaResponse {
    /// Base64 media bytes
    pub data: Option<String>,
    /// Error description on failure
    pub error: Option<String>,
}

/// Connection phase as reported by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeConnection {
    /// Handshake
    Connecting,
    /// Usable
    Open,
    /// Closed
    Close,
}

/// Event posted by the bridge to the webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// `connection.update`
    ConnectionUpdate {
        /// Pairing QR
        #[serde(default)]
        qr: Option<String>,
        /// Connection phase
        #[serde(default)]
        connection: Option<BridgeConnection>,
        /// Confirmed user JID on open
        #[serde(default, rename = "userId")]
        user_id: Option<String>,
        /// Close status code
        #[serde(default, rename = "statusCode")]
        status_code: Option<u16>,
    },
    /// `creds.update`
    CredsUpdate {
        /// Full credentials object
        creds: Value,
    },
    /// Signal key changes; `null` deletes a key
    KeysUpdate {
        /// Key name to value
        keys: HashMap<String, Option<Value>>,
    },
    /// `messages.upsert`
    MessagesUpsert {
        /// Raw messages
        messages: Vec<Value>,
        /// `notify` or `append`
        #[serde(rename = "type")]
        kind: UpsertKind,
    },
}

impl From<BridgeEvent> for SocketEvent {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::ConnectionUpdate {
                qr,
                connection,
                user_id,
                status_code,
            } => SocketEvent::ConnectionUpdate(ConnectionUpdate {
                qr,
                connection: connection.map(|c| match c {
                    BridgeConnection::Connecting => ConnectionState::Connecting,
                    BridgeConnection::Open => ConnectionState::Open { user_id },
                    BridgeConnection::Close => ConnectionState::Close {
                        reason: DisconnectReason::from_status_code(status_code),
                    },
                }),
            }),
            BridgeEvent::CredsUpdate { creds } => SocketEvent::CredsUpdate(creds),
            BridgeEvent::KeysUpdate { keys } => SocketEvent::KeysUpdate(
                keys.into_iter()
                    .map(|(name, value)| KeyEntry { name, value })
                    .collect(),
            ),
            BridgeEvent::MessagesUpsert { messages, kind } => {
                SocketEvent::MessagesUpsert { messages, kind }
            }
        }
    }
}
