use serde::Deserialize;

/// Default Baileys bridge server URL
pub const DEFAULT_BRIDGE_URL: &str = "http://localhost:3001";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Baileys bridge connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Bridge server URL (default: http://localhost:3001)
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    /// URL the bridge posts session events to; the session id is appended
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_bridge_url() -> String {
    DEFAULT_BRIDGE_URL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            callback_url: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl BridgeConfig {
    /// Create with bridge URL
    #[must_use]
    pub fn new(bridge_url: impl Into<String>) -> Self {
        Self {
            bridge_url: bridge_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Set the event callback base URL
    #[must_use]
    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub(crate) fn session_url(&self, session_id: &str, action: &str) -> String {
        format!("{}/sessions/{}/{}", self.bridge_url, session_id, action)
    }

    pub(crate) fn callback_for(&self, session_id: &str) -> Option<String> {
        self.callback_url
            .as_ref()
            .map(|base| format!("{base}/{session_id}"))
    }
}
