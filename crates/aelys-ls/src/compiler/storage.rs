//
// compiler/storage.rs
//
// Storage directory and persisted install state (`state.json`)
//

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const STATE_FILE_NAME: &str = "state.json";
const APP_DIR_NAME: &str = "aelys-ls";

/// Platform data directory for managed compiler binaries.
#[cfg(unix)]
pub fn default_storage_dir() -> PathBuf {
    match xdg::BaseDirectories::with_prefix(APP_DIR_NAME) {
        Ok(dirs) => dirs.get_data_home(),
        Err(err) => {
            log::warn!("XDG base directories unavailable: {}", err);
            std::env::temp_dir().join(APP_DIR_NAME)
        }
    }
}

/// Platform data directory for managed compiler binaries.
#[cfg(not(unix))]
pub fn default_storage_dir() -> PathBuf {
    std::env::var_os("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

/// File name of the managed binary on this host.
pub fn binary_file_name() -> &'static str {
    if cfg!(windows) {
        "aelys.exe"
    } else {
        "aelys"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    /// Tag of the binary currently installed in the storage directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
    /// Tag the user chose to skip; cleared by every successful install
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored_version: Option<String>,
}

/// `state.json` inside the storage directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(storage_dir: &Path) -> Self {
        Self {
            path: storage_dir.join(STATE_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable state is treated as empty.
    pub async fn load(&self) -> PersistedState {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return PersistedState::default()
            }
            Err(err) => {
                log::warn!("Failed to read {}: {}", self.path.display(), err);
                return PersistedState::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|err| {
            log::warn!("Ignoring malformed {}: {}", self.path.display(), err);
            PersistedState::default()
        })
    }

    pub async fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    /// Load, apply `f`, save.
    pub async fn update(&self, f: impl FnOnce(&mut PersistedState)) -> Result<PersistedState> {
        let mut state = self.load().await;
        f(&mut state);
        self.save(&state).await?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_state_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        assert_eq!(store.load().await, PersistedState::default());
    }

    #[tokio::test]
    async fn test_round_trip_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(&dir.path().join("nested"));
        store
            .update(|s| s.installed_version = Some("v0.2.0".into()))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"installedVersion\": \"v0.2.0\""));
        assert!(!raw.contains("ignoredVersion"));

        let state = store.load().await;
        assert_eq!(state.installed_version.as_deref(), Some("v0.2.0"));
        assert_eq!(state.ignored_version, None);
    }

    #[tokio::test]
    async fn test_malformed_state_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STATE_FILE_NAME), "{not json").unwrap();
        let store = StateStore::new(dir.path());
        assert_eq!(store.load().await, PersistedState::default());
    }

    #[test]
    fn test_default_storage_dir_is_absolute_or_temp() {
        let dir = default_storage_dir();
        assert!(dir.ends_with(APP_DIR_NAME));
    }
}
