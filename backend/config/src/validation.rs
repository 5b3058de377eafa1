//! Config validation: checks with field paths and user-friendly messages.

use crate::schema::RelayConfig;
use cmdrelay_core::PermissionLevel;
use thiserror::Error;

/// Batches smaller than this split almost every reply.
const MIN_SENSIBLE_BATCH_CHARS: usize = 100;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &RelayConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_commands(config, &mut report);
    validate_permissions(config, &mut report);
    validate_messages(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_commands(config: &RelayConfig, report: &mut ValidationReport) {
    let Some(prefix) = config.commands.as_ref().and_then(|c| c.prefix.as_deref()) else {
        return;
    };
    if prefix.is_empty() {
        report.error("commands.prefix", "Prefix cannot be empty; every message would be a command");
    } else if prefix.chars().any(char::is_whitespace) {
        report.error("commands.prefix", "Prefix cannot contain whitespace");
    }
}

fn validate_permissions(config: &RelayConfig, report: &mut ValidationReport) {
    let Some(permissions) = &config.permissions else {
        report.warn("permissions", "No permissions configured; gated commands are unusable");
        return;
    };
    for id in permissions.users.keys() {
        if id.trim().is_empty() {
            report.error("permissions.users", "Sender id cannot be empty");
        }
    }
    if permissions.default.unwrap_or_default() > PermissionLevel::None {
        report.warn(
            "permissions.default",
            "Every sender is granted elevated commands by default",
        );
    }
    if !permissions.users.values().any(|l| *l == PermissionLevel::Owner) {
        report.warn("permissions.users", "No owner configured");
    }
}

fn validate_messages(config: &RelayConfig, report: &mut ValidationReport) {
    let Some(messages) = &config.messages else { return };
    if let Some(max) = messages.batch_max_chars {
        if max == 0 {
            report.error("messages.batchMaxChars", "batchMaxChars must be > 0");
        } else if max < MIN_SENSIBLE_BATCH_CHARS {
            report.warn(
                "messages.batchMaxChars",
                format!("batchMaxChars {max} is very small; replies will be split into many messages"),
            );
        }
    }
    if messages.reply_timeout_secs == Some(0) {
        report.error("messages.replyTimeoutSecs", "replyTimeoutSecs must be >= 1");
    }
}

fn validate_logging(config: &RelayConfig, report: &mut ValidationReport) {
    let Some(level) = config.logging.as_ref().and_then(|l| l.level.as_deref()) else {
        return;
    };
    // Directives like "cmdrelay_commands=debug" are passed through to tracing.
    if !level.contains('=') && !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        report.error(
            "logging.level",
            format!("Unknown log level '{level}'. Use one of {}", LOG_LEVELS.join(", ")),
        );
    }
}
