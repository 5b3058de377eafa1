//! cmdrelay runtime configuration schema.
//!
//! Every section is optional so a partial (or absent) file parses; unset
//! values are filled by [`crate::defaults::apply_all_defaults`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cmdrelay_core::PermissionLevel;
use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_BATCH_MAX_CHARS, DEFAULT_LOG_LEVEL, DEFAULT_PREFIX, DEFAULT_REPLY_TIMEOUT_SECS,
};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Command syntax
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<CommandsConfig>,

    /// Who may run gated commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionsConfig>,

    /// Reply and read-receipt behaviour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<MessagesConfig>,

    /// Per-user auto-invite preferences, written back by `/optOut`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_invite: Option<AutoInviteConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsConfig {
    /// Sender id → level.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub users: BTreeMap<String, PermissionLevel>,

    /// Level for senders not listed in `users`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<PermissionLevel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mark_read: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_max_chars: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoInviteConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opt_out: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. "info" or "cmdrelay_commands=debug".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Log directory; relative paths resolve against the config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Effective values
// ---------------------------------------------------------------------------

impl RelayConfig {
    pub fn prefix(&self) -> &str {
        self.commands
            .as_ref()
            .and_then(|c| c.prefix.as_deref())
            .unwrap_or(DEFAULT_PREFIX)
    }

    pub fn mark_read(&self) -> bool {
        self.messages
            .as_ref()
            .and_then(|m| m.mark_read)
            .unwrap_or(true)
    }

    pub fn batch_max_chars(&self) -> usize {
        self.messages
            .as_ref()
            .and_then(|m| m.batch_max_chars)
            .unwrap_or(DEFAULT_BATCH_MAX_CHARS)
    }

    pub fn reply_timeout(&self) -> Duration {
        let secs = self
            .messages
            .as_ref()
            .and_then(|m| m.reply_timeout_secs)
            .unwrap_or(DEFAULT_REPLY_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Log directory, `<config_dir>/logs` unless configured.
    pub fn log_dir(&self, config_dir: &Path) -> PathBuf {
        match self.logging.as_ref().and_then(|l| l.dir.as_deref()) {
            Some(dir) => config_dir.join(dir),
            None => config_dir.join("logs"),
        }
    }

    pub fn opted_out(&self) -> &[String] {
        self.auto_invite
            .as_ref()
            .map(|a| a.opt_out.as_slice())
            .unwrap_or_default()
    }
}
