use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of messages the transport can deliver. Only `Text` is ever parsed
/// as a command; everything else passes through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Object,
    Sound,
    SessionInvite,
    Other,
}

/// A message received from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub sender_id: String,
    pub content: String,
    pub kind: MessageKind,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(sender_id: impl Into<String>, content: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.into(),
            content: content.into(),
            kind,
            received_at: Utc::now(),
        }
    }

    /// Shorthand for a text message with a fresh id.
    pub fn text(sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(sender_id, content, MessageKind::Text)
    }

    /// The conversation this message belongs to.
    pub fn conversation(&self) -> ConversationKey {
        ConversationKey::for_sender(&self.sender_id)
    }

    pub fn is_text(&self) -> bool {
        self.kind == MessageKind::Text
    }
}

/// Identifies the logical conversation with one sender.
///
/// Used both to route replies and to key pending-response waiters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn for_sender(sender_id: &str) -> Self {
        Self(sender_id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-text payloads a command can send back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuredPayload {
    /// Invitation to join a running world session.
    SessionInvite {
        session_id: String,
        world_name: String,
    },
    /// An item handed to the recipient (e.g. a session orb).
    Object {
        label: String,
        data: serde_json::Value,
    },
}
