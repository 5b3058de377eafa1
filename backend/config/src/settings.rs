//! `SettingsStore` persisted in the config file.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use cmdrelay_core::{RelayError, SettingsStore};
use tokio::sync::Mutex;
use tracing::info;

use crate::io::write_config;
use crate::schema::{AutoInviteConfig, RelayConfig};

/// Keeps the loaded config in memory and writes it back on every change.
pub struct ConfigSettingsStore {
    path: PathBuf,
    config: Mutex<RelayConfig>,
}

impl ConfigSettingsStore {
    pub fn new(config: RelayConfig, path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config: Mutex::new(config),
        }
    }

    /// Snapshot of the current in-memory config.
    pub async fn snapshot(&self) -> RelayConfig {
        self.config.lock().await.clone()
    }
}

#[async_trait]
impl SettingsStore for ConfigSettingsStore {
    async fn toggle_auto_invite_opt_out(&self, user_id: &str) -> Result<bool> {
        let mut config = self.config.lock().await;

        let mut updated = config.clone();
        let list = &mut updated
            .auto_invite
            .get_or_insert_with(AutoInviteConfig::default)
            .opt_out;
        let opted_out = match list.iter().position(|id| id == user_id) {
            Some(i) => {
                list.remove(i);
                false
            }
            None => {
                list.push(user_id.to_string());
                true
            }
        };

        // The in-memory copy only changes once the file write succeeded.
        write_config(&updated, &self.path)
            .await
            .map_err(|e| RelayError::StorageError(format!("{e:#}")))?;
        *config = updated;

        info!(user_id, opted_out, "Auto-invite opt-out saved");
        Ok(opted_out)
    }

    async fn is_opted_out(&self, user_id: &str) -> bool {
        self.config
            .lock()
            .await
            .opted_out()
            .iter()
            .any(|id| id == user_id)
    }
}
