//! Text-command dispatch for cmdrelay.
//!
//! Inbound chat messages are offered to pending waits first, then parsed as
//! prefixed commands, resolved against the registry, permission-checked and
//! run with failures contained to the one message.

pub mod batch;
pub mod context;
pub mod correlator;
pub mod detection;
pub mod dispatch;
pub mod handlers;
pub mod registry;
pub mod types;

#[cfg(test)]
mod test_support;

pub use batch::{BatchReply, DEFAULT_BATCH_MAX_CHARS};
pub use context::{CommandContext, Services};
pub use correlator::{PendingResponse, ResponseCorrelator, WaitError};
pub use detection::detect_command;
pub use dispatch::{
    CommandDispatcher, DispatchOptions, DispatchOutcome, DispatcherBuilder, HandlerFailure,
    PERMISSION_DENIED_REPLY, UNKNOWN_COMMAND_REPLY,
};
pub use registry::{CommandRegistry, RegistryError, builtin_commands};
pub use types::{
    AsyncCommand, CommandCategory, CommandDescriptor, CommandHandler, CommandInvocation,
    SyncCommand, join_args,
};

/// Build a dispatcher serving the built-in command catalog.
pub fn build_default_dispatcher(
    services: Services,
    options: DispatchOptions,
) -> Result<CommandDispatcher, RegistryError> {
    let mut builder = DispatcherBuilder::new(services).options(options);
    builder.register_builtins()?;
    Ok(builder.build())
}
