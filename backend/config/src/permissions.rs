//! Permission levels read from the `permissions` config section.

use std::collections::HashMap;

use cmdrelay_core::{PermissionLevel, PermissionResolver};

use crate::schema::RelayConfig;

/// Static sender → level table. Unlisted senders get the configured default.
#[derive(Debug, Clone, Default)]
pub struct ConfigPermissions {
    users: HashMap<String, PermissionLevel>,
    default: PermissionLevel,
}

impl ConfigPermissions {
    pub fn from_config(config: &RelayConfig) -> Self {
        let Some(permissions) = &config.permissions else {
            return Self::default();
        };
        Self {
            users: permissions
                .users
                .iter()
                .map(|(id, level)| (id.clone(), *level))
                .collect(),
            default: permissions.default.unwrap_or_default(),
        }
    }
}

impl PermissionResolver for ConfigPermissions {
    fn check(&self, sender_id: &str) -> PermissionLevel {
        self.users.get(sender_id).copied().unwrap_or(self.default)
    }
}
