//! Error types for zapgate-core
//!
//! One taxonomy shared by the session store, the media pipeline and the
//! process wiring. Operator-driven actions surface these to the caller;
//! background paths log them and move on.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// A session with this id is already managed
    #[error("session already exists: {0}")]
    DuplicateSession(String),

    /// Session id is not a single plain path component
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// No session with this id is managed
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Opening the network connection failed synchronously
    #[error("session setup failed for {session_id}: {message}")]
    Setup {
        /// Session being connected
        session_id: String,
        /// Failure description from the socket layer
        message: String,
    },

    /// Send attempted on a session that is not connected
    #[error("session {0} is not connected")]
    NotConnected(String),

    /// Recipient has no account on the network
    #[error("{0} is not registered on WhatsApp")]
    NoWhatsAppAccount(String),

    /// Image download or transcoding failed (non-fatal)
    #[error("transcode failed: {0}")]
    Transcode(String),

    /// Notification could not be delivered after all retries (non-fatal)
    #[error("notification delivery failed: {0}")]
    NotificationDelivery(String),

    /// Restoring one persisted session failed
    #[error("restore failed for {session_id}: {message}")]
    Restore {
        /// Session being restored
        session_id: String,
        /// Failure description
        message: String,
    },

    /// Session state machine rejected a transition
    #[error("invalid transition for {session_id}: {from} -> {to}")]
    InvalidTransition {
        /// Session id
        session_id: String,
        /// Current state name
        from: &'static str,
        /// Requested state name
        to: &'static str,
    },

    /// A connected session has no resolvable phone number
    #[error("session {0} connected without a phone number")]
    MissingIdentity(String),

    /// Socket/network error outside of setup
    #[error("socket error: {0}")]
    Socket(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error came from a caller mistake rather than the network.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::DuplicateSession(_)
                | Error::InvalidSessionId(_)
                | Error::SessionNotFound(_)
                | Error::NotConnected(_)
                | Error::NoWhatsAppAccount(_)
                | Error::InvalidTransition { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
