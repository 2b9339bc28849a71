//! Production configuration validation

use super::config::AppConfig;
use anyhow::{bail, Result};
use tracing::warn;
use zapgate_notifier::Environment;

/// Reject configurations that cannot run in production
pub fn validate_production_config(config: &AppConfig) -> Result<()> {
    if config.backend.environment != Environment::Production {
        return Ok(());
    }

    if config
        .backend
        .api_key
        .as_deref()
        .map_or(true, |k| k.trim().is_empty())
    {
        bail!("backend.api_key is required in production (set ZAPGATE_BACKEND__API_KEY)");
    }

    if !config.backend.base_url.starts_with("https://") {
        warn!(
            base_url = %config.backend.base_url,
            "SECURITY WARNING: Backend URL is not HTTPS in production. \
             Session data and messages will be sent in clear text."
        );
    }

    if config.server.host == "0.0.0.0" && config.whatsapp.callback_url.is_none() {
        warn!(
            "Server is binding to all interfaces but no bridge callback_url is set. \
             The bridge cannot deliver session events."
        );
    }

    Ok(())
}
