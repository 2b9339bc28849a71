//! Events published by the session store.

use super::record::SessionSnapshot;
use super::state::SessionStatus;
use crate::message::NormalizedMessage;
use chrono::{DateTime, Utc};

/// Session lifecycle and message event
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Status changed (or a disconnect is being reported explicitly)
    StatusChanged {
        /// Session id
        session_id: String,
        /// New status
        status: SessionStatus,
        /// Error text for setup failures
        error: Option<String>,
        /// Last disconnect or connect
        last_seen: Option<DateTime<Utc>>,
    },
    /// Pairing QR issued
    QrUpdated {
        /// Session id
        session_id: String,
        /// QR payload
        qr: String,
        /// The session already had a known phone number
        is_regeneration: bool,
    },
    /// Connection opened with a confirmed phone number
    SessionConnected {
        /// Full record snapshot
        snapshot: SessionSnapshot,
    },
    /// Processable inbound message
    MessageReceived {
        /// Normalized message
        message: Box<NormalizedMessage>,
    },
    /// Message sent through this orchestrator
    MessageSent {
        /// Normalized `from_me` message
        message: Box<NormalizedMessage>,
    },
}

impl SessionEvent {
    /// Session the event belongs to
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::StatusChanged { session_id, .. } | Self::QrUpdated { session_id, .. } => {
                session_id
            }
            Self::SessionConnected { snapshot } => &snapshot.session_id,
            Self::MessageReceived { message } | Self::MessageSent { message } => {
                &message.session_id
            }
        }
    }
}
