//! Notifier configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deployment environment; picks retry defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Fewer attempts, shorter timeouts
    #[default]
    Development,
    /// More attempts, longer timeouts, API key required
    Production,
}

impl Environment {
    /// Default attempts per request
    #[must_use]
    pub fn default_max_attempts(&self) -> u32 {
        match self {
            Self::Development => 2,
            Self::Production => 5,
        }
    }

    /// Default per-attempt timeout
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        match self {
            Self::Development => Duration::from_secs(5),
            Self::Production => Duration::from_secs(15),
        }
    }

    /// Default delay after the first failure
    #[must_use]
    pub fn default_base_delay(&self) -> Duration {
        match self {
            Self::Development => Duration::from_millis(500),
            Self::Production => Duration::from_secs(1),
        }
    }
}

/// Backend notifier settings
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Backend base URL, e.g. `https://crm.example.com/api`
    pub base_url: String,
    /// Bearer token
    pub api_key: Option<String>,
    /// Environment the defaults came from
    pub environment: Environment,
    /// Attempts per request, first try included
    pub max_attempts: u32,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Backoff base delay, doubled per attempt
    pub base_delay: Duration,
}

impl NotifierConfig {
    /// Settings with the environment's retry defaults
    #[must_use]
    pub fn new(base_url: impl Into<String>, environment: Environment) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            environment,
            max_attempts: environment.default_max_attempts(),
            timeout: environment.default_timeout(),
            base_delay: environment.default_base_delay(),
        }
    }

    /// Set the bearer token
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override attempts
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Override the per-attempt timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the backoff base delay
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Full URL of an endpoint path
    pub(crate) fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}
