//! Structured logging for cmdrelay.
//!
//! Subscriber setup (console plus rolling NDJSON file), command audit events,
//! and redaction of secrets before anything user-supplied reaches a log.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{CommandEvent, CommandEventLogger, EventLogEntry};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
