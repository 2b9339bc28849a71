//! Persisted credential folders.
//!
//! Layout: `<base>/<session_id>/creds.json` plus one JSON file per signal key
//! (`session-*`, `pre-key-*`, `sender-key-*`, `app-state-sync-*`, ...).

use serde_json::Value;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use zapgate_core::{Error, Result};

use crate::socket::KeyEntry;

/// Primary credentials file
pub const CREDS_FILE: &str = "creds.json";

/// Prefixes of key artifacts that mark a folder as a paired session
pub const KEY_ARTIFACT_PREFIXES: &[&str] = &["session-", "pre-key-", "sender-key-", "app-state-sync-"];

/// Credentials and keys read from a session folder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    /// Contents of `creds.json`, `None` for a fresh pairing
    pub creds: Option<Value>,
    /// Key name (file stem) to value
    pub keys: HashMap<String, Value>,
}

impl AuthState {
    /// Load the folder. A missing folder or `creds.json` is a fresh state;
    /// unreadable JSON is an error.
    pub async fn load(folder: &Path) -> Result<Self> {
        let mut state = Self::default();

        match tokio::fs::read(folder.join(CREDS_FILE)).await {
            Ok(bytes) => state.creds = Some(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(state),
            Err(e) => return Err(Error::Io(e)),
        }

        let mut dir = tokio::fs::read_dir(folder).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == CREDS_FILE {
                continue;
            }
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            let bytes = tokio::fs::read(entry.path()).await?;
            match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    state.keys.insert(stem.to_string(), value);
                }
                Err(e) => warn!(file = %name, error = %e, "Skipping unreadable key file"),
            }
        }

        Ok(state)
    }

    /// Has primary credentials
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.creds.is_some()
    }
}

/// Write `creds.json` atomically (temp file then rename).
pub async fn persist_creds(folder: &Path, creds: &Value) -> Result<()> {
    tokio::fs::create_dir_all(folder).await?;
    let bytes = serde_json::to_vec(creds)?;
    let tmp = folder.join(format!("{CREDS_FILE}.tmp"));
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, folder.join(CREDS_FILE)).await?;
    Ok(())
}

/// Write or delete changed key files.
pub async fn persist_keys(folder: &Path, keys: &[KeyEntry]) -> Result<()> {
    tokio::fs::create_dir_all(folder).await?;
    for key in keys {
        let path = folder.join(format!("{}.json", sanitize_key_name(&key.name)));
        match &key.value {
            Some(value) => tokio::fs::write(&path, serde_json::to_vec(value)?).await?,
            None => match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            },
        }
    }
    Ok(())
}

fn sanitize_key_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            c => c,
        })
        .collect()
}

/// `creds.json` plus at least one key artifact
pub async fn has_valid_credentials(folder: &Path) -> bool {
    if !tokio::fs::try_exists(folder.join(CREDS_FILE))
        .await
        .unwrap_or(false)
    {
        return false;
    }

    let Ok(mut dir) = tokio::fs::read_dir(folder).await else {
        return false;
    };
    while let Ok(Some(entry)) = dir.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if KEY_ARTIFACT_PREFIXES.iter().any(|p| name.starts_with(p)) {
            return true;
        }
    }
    false
}

/// Session ids under `base` whose folder carries valid credential markers,
/// in directory listing order. A missing base directory yields nothing.
pub async fn detect_sessions(base: &Path) -> Result<Vec<String>> {
    let mut dir = match tokio::fs::read_dir(base).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %base.display(), "Auth base directory does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let mut found = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if validate_session_id(&name).is_err() {
            continue;
        }
        if has_valid_credentials(&entry.path()).await {
            found.push(name);
        }
    }
    Ok(found)
}

/// Recursively delete a session folder. Already gone counts as success.
pub async fn remove_auth_folder(folder: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(folder).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Reject ids that are not exactly one plain path component. Ids name a
/// folder under the base directory and a segment of bridge URLs.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && !session_id.starts_with('.')
        && !session_id
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_control())
        && Path::new(session_id)
            .components()
            .eq([Component::Normal(OsStr::new(session_id))]);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidSessionId(session_id.to_string()))
    }
}

/// Default folder for a session under the base directory
pub fn session_folder(base: &Path, session_id: &str) -> Result<PathBuf> {
    validate_session_id(session_id)?;
    Ok(base.join(session_id))
}
