//! Session lifecycle state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use zapgate_core::{Error, Result};

/// Flat status tag reported to observers and the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Not connected
    Disconnected,
    /// Handshake or pairing in progress
    Connecting,
    /// Usable connection
    Connected,
    /// Setup failed; needs an explicit restart
    Error,
}

impl SessionStatus {
    /// Wire tag
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of one session.
///
/// ```text
/// Disconnected ──connect──▶ Connecting ──open──▶ Connected
///      ▲                      │  │                  │
///      └──────────close───────┘  └─setup failure─▶ Error
///      └──────────────────close─────────────────────┘
/// Error ──connect──▶ Connecting
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Handshake or pairing in progress
    Connecting,
    /// Connected with a confirmed identity
    Connected {
        /// Network-confirmed user JID
        user_id: Option<String>,
    },
    /// Setup failed
    Error {
        /// Failure description
        reason: String,
    },
}

impl SessionState {
    /// Status tag for this state
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Disconnected => SessionStatus::Disconnected,
            Self::Connecting => SessionStatus::Connecting,
            Self::Connected { .. } => SessionStatus::Connected,
            Self::Error { .. } => SessionStatus::Error,
        }
    }

    /// Error reason when in the error state
    #[must_use]
    pub fn error_reason(&self) -> Option<&str> {
        match self {
            Self::Error { reason } => Some(reason),
            _ => None,
        }
    }

    /// `Disconnected | Error → Connecting`
    pub fn begin_connect(&mut self, session_id: &str) -> Result<()> {
        match self {
            Self::Disconnected | Self::Error { .. } => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(self.rejected(session_id, SessionStatus::Connecting)),
        }
    }

    /// `Connecting → Connected`
    pub fn open(&mut self, session_id: &str, user_id: Option<String>) -> Result<()> {
        match self {
            Self::Connecting => {
                *self = Self::Connected { user_id };
                Ok(())
            }
            _ => Err(self.rejected(session_id, SessionStatus::Connected)),
        }
    }

    /// `Connecting | Connected → Disconnected`
    pub fn close(&mut self, session_id: &str) -> Result<()> {
        match self {
            Self::Connecting | Self::Connected { .. } => {
                *self = Self::Disconnected;
                Ok(())
            }
            _ => Err(self.rejected(session_id, SessionStatus::Disconnected)),
        }
    }

    /// `Connecting → Error`
    pub fn fail(&mut self, session_id: &str, reason: impl Into<String>) -> Result<()> {
        match self {
            Self::Connecting => {
                *self = Self::Error {
                    reason: reason.into(),
                };
                Ok(())
            }
            _ => Err(self.rejected(session_id, SessionStatus::Error)),
        }
    }

    /// Unconditional teardown to `Disconnected`
    pub fn reset(&mut self) {
        *self = Self::Disconnected;
    }

    fn rejected(&self, session_id: &str, to: SessionStatus) -> Error {
        Error::InvalidTransition {
            session_id: session_id.to_string(),
            from: self.status().as_str(),
            to: to.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = SessionState::default();
        state.begin_connect("s1").unwrap();
        assert_eq!(state.status(), SessionStatus::Connecting);
        state.open("s1", Some("1@s.whatsapp.net".into())).unwrap();
        assert_eq!(state.status(), SessionStatus::Connected);
        state.close("s1").unwrap();
        assert_eq!(state, SessionState::Disconnected);
    }

    #[test]
    fn test_error_requires_explicit_connect() {
        let mut state = SessionState::Connecting;
        state.fail("s1", "socket refused").unwrap();
        assert_eq!(state.error_reason(), Some("socket refused"));

        assert!(state.close("s1").is_err());
        assert!(state.open("s1", None).is_err());
        state.begin_connect("s1").unwrap();
        assert_eq!(state, SessionState::Connecting);
    }

    #[test]
    fn test_rejected_transitions() {
        let mut state = SessionState::Connected { user_id: None };
        let err = state.begin_connect("s1").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: "connected",
                to: "connecting",
                ..
            }
        ));
        assert!(state.fail("s1", "x").is_err());

        let mut idle = SessionState::Disconnected;
        assert!(idle.close("s1").is_err());
        assert!(idle.open("s1", None).is_err());
    }

    #[test]
    fn test_reset_from_anywhere() {
        for mut state in [
            SessionState::Connecting,
            SessionState::Connected { user_id: None },
            SessionState::Error {
                reason: "x".into(),
            },
        ] {
            state.reset();
            assert_eq!(state, SessionState::Disconnected);
        }
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Connected).unwrap(),
            "\"connected\""
        );
    }
}
