//! Error types for the backend notifier

use thiserror::Error;

/// Notifier error type
#[derive(Debug, Error)]
pub enum NotifierError {
    /// Transport failure (connect, DNS, TLS, body)
    #[error("http error: {0}")]
    Http(String),

    /// The attempt exceeded its timeout and was aborted
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// All attempts failed
    #[error("delivery to {endpoint} failed after {attempts} attempts: {message}")]
    Delivery {
        /// Endpoint path
        endpoint: String,
        /// Attempts made
        attempts: u32,
        /// Last error
        message: String,
    },

    /// A connected session has no resolvable phone number
    #[error("session {0} has no phone number")]
    MissingPhoneNumber(String),

    /// Invalid notifier configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<NotifierError> for zapgate_core::Error {
    fn from(e: NotifierError) -> Self {
        match e {
            NotifierError::MissingPhoneNumber(id) => zapgate_core::Error::MissingIdentity(id),
            NotifierError::Configuration(msg) => zapgate_core::Error::Configuration(msg),
            other => zapgate_core::Error::NotificationDelivery(other.to_string()),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, NotifierError>;
