use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Ordered capability tier gating command execution.
///
/// Ordering is significant: `None < Moderator < Owner`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    #[default]
    None,
    Moderator,
    Owner,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::None => write!(f, "none"),
            PermissionLevel::Moderator => write!(f, "moderator"),
            PermissionLevel::Owner => write!(f, "owner"),
        }
    }
}

impl FromStr for PermissionLevel {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(PermissionLevel::None),
            "moderator" | "mod" => Ok(PermissionLevel::Moderator),
            "owner" => Ok(PermissionLevel::Owner),
            other => Err(RelayError::InvalidPermission(other.to_string())),
        }
    }
}

/// Resolves the permission level of a sender.
pub trait PermissionResolver: Send + Sync {
    fn check(&self, sender_id: &str) -> PermissionLevel;
}
