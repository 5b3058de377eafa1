//! Command audit events.
//!
//! One entry per dispatch decision, emitted on the `command_events` target so
//! the JSON file layer can be filtered down to an audit trail.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandEvent {
    Executed { command: String, args: String },
    Failed { command: String, error: String },
    Denied { command: String, required: String },
    Unknown { token: String },
    /// A message consumed by a pending wait instead of being dispatched.
    Claimed { content: String },
}

impl CommandEvent {
    /// Scrub user-supplied text in place.
    fn redact(&mut self) {
        match self {
            CommandEvent::Executed { args, .. } => *args = redact_sensitive_data(args),
            CommandEvent::Failed { error, .. } => *error = redact_sensitive_data(error),
            CommandEvent::Unknown { token } => *token = redact_sensitive_data(token),
            CommandEvent::Claimed { content } => *content = redact_sensitive_data(content),
            CommandEvent::Denied { .. } => {}
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: CommandEvent,
}

pub struct CommandEventLogger;

impl CommandEventLogger {
    /// Build the redacted entry for `event`.
    pub fn entry(sender_id: &str, mut event: CommandEvent) -> EventLogEntry {
        event.redact();
        EventLogEntry {
            sender_id: sender_id.into(),
            timestamp: Utc::now(),
            event,
        }
    }

    pub fn log_event(sender_id: &str, event: CommandEvent) {
        let entry = Self::entry(sender_id, event);
        match serde_json::to_string(&entry.event) {
            Ok(json) => info!(target: "command_events", sender_id = %entry.sender_id, event = %json, "Command event"),
            Err(_) => info!(target: "command_events", sender_id = %entry.sender_id, event = ?entry.event, "Command event"),
        }
    }
}
