use std::fmt;

use serde::{Deserialize, Serialize};

/// A running world session as seen by command bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldInfo {
    pub session_id: String,
    /// Display name.
    pub name: String,
    /// Name without formatting, used for exact lookups.
    pub raw_name: String,
    pub active_users: u32,
    pub users: u32,
    pub access_level: AccessLevel,
}

/// Who may join a world session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    Private,
    Lan,
    Contacts,
    ContactsPlus,
    RegisteredUsers,
    Anyone,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessLevel::Private => "Private",
            AccessLevel::Lan => "LAN",
            AccessLevel::Contacts => "Contacts",
            AccessLevel::ContactsPlus => "ContactsPlus",
            AccessLevel::RegisteredUsers => "RegisteredUsers",
            AccessLevel::Anyone => "Anyone",
        };
        f.write_str(s)
    }
}

/// A user present in a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldUser {
    pub user_id: String,
    pub user_name: String,
}

/// How to locate a user inside a world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserQuery {
    ById(String),
    /// Case-insensitive user name match.
    ByName(String),
}

impl UserQuery {
    pub fn matches(&self, user: &WorldUser) -> bool {
        match self {
            UserQuery::ById(id) => user.user_id == *id,
            UserQuery::ByName(name) => user.user_name.to_lowercase() == name.to_lowercase(),
        }
    }
}
