/// Command descriptor and handler types.
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use cmdrelay_core::{InboundMessage, PermissionLevel};
use serde::{Deserialize, Serialize};

use crate::context::CommandContext;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandCategory {
    Common,
    World,
    Debug,
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandCategory::Common => write!(f, "Common"),
            CommandCategory::World => write!(f, "World"),
            CommandCategory::Debug => write!(f, "Debug"),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// A command body that runs to completion on the dispatching task.
///
/// Sync bodies cannot await the messaging service; replies go through
/// [`CommandContext::queue_reply`] and are delivered once the body returns.
pub trait SyncCommand: Send + Sync {
    fn run(&self, ctx: &CommandContext, msg: &InboundMessage, args: &[String]) -> Result<()>;
}

impl<F> SyncCommand for F
where
    F: Fn(&CommandContext, &InboundMessage, &[String]) -> Result<()> + Send + Sync,
{
    fn run(&self, ctx: &CommandContext, msg: &InboundMessage, args: &[String]) -> Result<()> {
        self(ctx, msg, args)
    }
}

/// A command body that may suspend. The dispatcher awaits it to completion
/// so its failure is observed like a sync failure.
#[async_trait]
pub trait AsyncCommand: Send + Sync {
    async fn run(&self, ctx: &CommandContext, msg: &InboundMessage, args: &[String]) -> Result<()>;
}

/// The two handler shapes a descriptor can carry.
#[derive(Clone)]
pub enum CommandHandler {
    Sync(Arc<dyn SyncCommand>),
    Async(Arc<dyn AsyncCommand>),
}

impl CommandHandler {
    pub fn sync(command: impl SyncCommand + 'static) -> Self {
        CommandHandler::Sync(Arc::new(command))
    }

    pub fn suspending(command: impl AsyncCommand + 'static) -> Self {
        CommandHandler::Async(Arc::new(command))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, CommandHandler::Async(_))
    }
}

impl fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandHandler::Sync(_) => f.write_str("CommandHandler::Sync"),
            CommandHandler::Async(_) => f.write_str("CommandHandler::Async"),
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Immutable registration record for one command.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    /// Canonical name as displayed (e.g. "optOut"); matched case-insensitively.
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
    pub usage: String,
    pub category: CommandCategory,
    pub required_permission: PermissionLevel,
    pub handler: CommandHandler,
}

impl CommandDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: CommandCategory,
        handler: CommandHandler,
    ) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: description.into(),
            usage: String::new(),
            category,
            required_permission: PermissionLevel::None,
            handler,
        }
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn requires(mut self, level: PermissionLevel) -> Self {
        self.required_permission = level;
        self
    }

    /// Lowercase lookup keys: the canonical name followed by every alias.
    pub fn lookup_keys(&self) -> Vec<String> {
        std::iter::once(&self.name)
            .chain(self.aliases.iter())
            .map(|k| k.to_lowercase())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Parsed invocation
// ---------------------------------------------------------------------------

/// A detected command invocation, prefix stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Lowercased command token used for lookup.
    pub name: String,
    /// The token as typed.
    pub raw_name: String,
    /// Remaining tokens, verbatim.
    pub args: Vec<String>,
}

impl CommandInvocation {
    /// Re-join the arguments with single spaces ("rest of the line").
    pub fn joined_args(&self) -> String {
        join_args(&self.args)
    }
}

/// Re-join argument tokens with single spaces.
pub fn join_args(args: &[String]) -> String {
    args.join(" ")
}
