//! Server configuration types
//!
//! Contains all configuration structures for the Zapgate server.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use zapgate_notifier::{Environment, NotifierConfig};
use zapgate_whatsapp::classifier::TranscodeOptions;
use zapgate_whatsapp::{BridgeConfig, StoreConfig};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub whatsapp: WhatsAppConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Session store settings; sessions created without a port report this
    /// process's listener port
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            server_port: Some(self.server.port),
            ..self.whatsapp.store_config()
        }
    }
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Session store and bridge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Parent directory of the per-session credential folders
    #[serde(default = "default_auth_base_dir")]
    pub auth_base_dir: String,
    /// Restore persisted sessions at startup
    #[serde(default = "default_true")]
    pub auto_restore: bool,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    /// Sessions restored concurrently per batch
    #[serde(default = "default_restore_concurrency")]
    pub restore_concurrency: usize,
    /// Baileys bridge base URL
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    #[serde(default = "default_bridge_timeout_secs")]
    pub bridge_timeout_secs: u64,
    /// Public URL of this server's bridge webhook, without the session id
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Pinned protocol version, e.g. `[2, 3000, 1015901307]`
    #[serde(default)]
    pub version: Option<Vec<u32>>,
    #[serde(default)]
    pub image: ImageConfig,
}

/// Inline image preview bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        let defaults = TranscodeOptions::default();
        Self {
            max_width: defaults.max_width,
            max_height: defaults.max_height,
            quality: defaults.quality,
        }
    }
}

/// External system of record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub environment: Environment,
    /// Overrides the environment default
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub base_delay_ms: Option<u64>,
}

/// Periodic metrics reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
    #[serde(default = "default_reset_interval_secs")]
    pub reset_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            report_interval_secs: default_report_interval_secs(),
            reset_interval_secs: default_reset_interval_secs(),
        }
    }
}

/// Log output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_true() -> bool {
    true
}
fn default_auth_base_dir() -> String {
    "auth_sessions".to_string()
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_reconnect_delay_ms() -> u64 {
    5_000
}
fn default_restart_delay_ms() -> u64 {
    2_000
}
fn default_restore_concurrency() -> usize {
    3
}
fn default_bridge_url() -> String {
    zapgate_whatsapp::bridge::config::DEFAULT_BRIDGE_URL.to_string()
}
fn default_bridge_timeout_secs() -> u64 {
    30
}
fn default_report_interval_secs() -> u64 {
    300
}
fn default_reset_interval_secs() -> u64 {
    3600
}

impl WhatsAppConfig {
    /// Session store settings
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            auth_base_dir: PathBuf::from(&self.auth_base_dir),
            auto_restore: self.auto_restore,
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            restart_delay: Duration::from_millis(self.restart_delay_ms),
            restore_concurrency: self.restore_concurrency.max(1),
            version: self.protocol_version(),
            server_port: None,
            transcode: TranscodeOptions {
                max_width: self.image.max_width,
                max_height: self.image.max_height,
                quality: self.image.quality.clamp(1, 100),
            },
        }
    }

    /// Bridge client settings
    pub fn bridge_config(&self) -> BridgeConfig {
        let config = BridgeConfig::new(&self.bridge_url).with_timeout_secs(self.bridge_timeout_secs);
        match &self.callback_url {
            Some(url) => config.with_callback_url(url),
            None => config,
        }
    }

    fn protocol_version(&self) -> Option<[u32; 3]> {
        match self.version.as_deref() {
            Some([a, b, c]) => Some([*a, *b, *c]),
            _ => None,
        }
    }
}

impl BackendConfig {
    /// Notifier settings; explicit values override the environment defaults
    pub fn notifier_config(&self) -> NotifierConfig {
        let mut config = NotifierConfig::new(&self.base_url, self.environment);
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            config = config.with_api_key(key);
        }
        if let Some(attempts) = self.max_attempts {
            config = config.with_max_attempts(attempts);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(ms) = self.base_delay_ms {
            config = config.with_base_delay(Duration::from_millis(ms));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whatsapp(version: Option<Vec<u32>>) -> WhatsAppConfig {
        WhatsAppConfig {
            auth_base_dir: "data/auth".into(),
            auto_restore: false,
            max_reconnect_attempts: 2,
            reconnect_delay_ms: 100,
            restart_delay_ms: 50,
            restore_concurrency: 0,
            bridge_url: "http://bridge:3001".into(),
            bridge_timeout_secs: 10,
            callback_url: Some("http://zapgate:8080/api/v1/webhooks/bridge".into()),
            version,
            image: ImageConfig::default(),
        }
    }

    #[test]
    fn test_store_config_mapping() {
        let store = whatsapp(Some(vec![2, 3000, 1])).store_config();
        assert_eq!(store.auth_base_dir, PathBuf::from("data/auth"));
        assert!(!store.auto_restore);
        assert_eq!(store.max_reconnect_attempts, 2);
        assert_eq!(store.reconnect_delay, Duration::from_millis(100));
        assert_eq!(store.restart_delay, Duration::from_millis(50));
        assert_eq!(store.restore_concurrency, 1);
        assert_eq!(store.version, Some([2, 3000, 1]));
    }

    #[test]
    fn test_store_config_carries_listener_port() {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 9090,
            },
            whatsapp: whatsapp(None),
            backend: BackendConfig {
                base_url: "http://localhost:3000/api".into(),
                api_key: None,
                environment: Environment::Development,
                max_attempts: None,
                timeout_secs: None,
                base_delay_ms: None,
            },
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        };
        assert_eq!(config.store_config().server_port, Some(9090));
        assert_eq!(config.whatsapp.store_config().server_port, None);
    }

    #[test]
    fn test_malformed_version_is_ignored() {
        assert_eq!(whatsapp(Some(vec![2, 3000])).store_config().version, None);
    }

    #[test]
    fn test_notifier_overrides() {
        let backend = BackendConfig {
            base_url: "https://crm.example.com/api".into(),
            api_key: Some(String::new()),
            environment: Environment::Production,
            max_attempts: Some(3),
            timeout_secs: None,
            base_delay_ms: Some(250),
        };
        let notifier = backend.notifier_config();
        assert!(notifier.api_key.is_none());
        assert_eq!(notifier.max_attempts, 3);
        assert_eq!(notifier.timeout, Duration::from_secs(15));
        assert_eq!(notifier.base_delay, Duration::from_millis(250));
    }
}
