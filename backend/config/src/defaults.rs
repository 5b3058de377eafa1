//! Config defaults: fills every unset optional value after parsing.

use crate::schema::{CommandsConfig, LoggingConfig, MessagesConfig, RelayConfig};

pub const DEFAULT_PREFIX: &str = "/";

/// Character budget for one batched reply.
pub const DEFAULT_BATCH_MAX_CHARS: usize = 1000;

/// How long a multi-turn command waits for the caller's next message.
pub const DEFAULT_REPLY_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: RelayConfig) -> RelayConfig {
    let config = apply_command_defaults(config);
    let config = apply_message_defaults(config);
    apply_logging_defaults(config)
}

fn apply_command_defaults(mut config: RelayConfig) -> RelayConfig {
    let commands = config.commands.get_or_insert_with(CommandsConfig::default);
    if commands.prefix.is_none() {
        commands.prefix = Some(DEFAULT_PREFIX.to_string());
    }
    config
}

fn apply_message_defaults(mut config: RelayConfig) -> RelayConfig {
    let messages = config.messages.get_or_insert_with(MessagesConfig::default);
    messages.mark_read.get_or_insert(true);
    messages.batch_max_chars.get_or_insert(DEFAULT_BATCH_MAX_CHARS);
    messages.reply_timeout_secs.get_or_insert(DEFAULT_REPLY_TIMEOUT_SECS);
    config
}

fn apply_logging_defaults(mut config: RelayConfig) -> RelayConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}
