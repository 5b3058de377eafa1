/// Command registry: built-in catalog and case-insensitive name/alias lookup.
use std::collections::{HashMap, HashSet};

use cmdrelay_core::PermissionLevel;
use thiserror::Error;

use crate::handlers::{
    BiggerHandler, EchoNextHandler, ExplodeHandler, GetSessionOrbHandler, HelpHandler,
    MarkAllReadHandler, OptOutHandler, OwoHandler, PlayTestSoundHandler, ReqInviteHandler,
    SmallerHandler, SpawnBoxHandler, ThrowErrAsyncHandler, ThrowErrHandler, WorldsHandler,
};
use crate::types::{CommandCategory, CommandDescriptor, CommandHandler};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate command name or alias: {0}")]
    DuplicateName(String),
    #[error("command name cannot be empty")]
    EmptyName,
}

/// Build the built-in command catalog, in listing order.
pub fn builtin_commands() -> Vec<CommandDescriptor> {
    use CommandCategory::{Common, Debug, World};
    use PermissionLevel::{Moderator, Owner};

    vec![
        CommandDescriptor::new("help", "Shows this help message", Common, CommandHandler::suspending(HelpHandler))
            .usage("[?command]")
            .aliases(&["commands"]),
        CommandDescriptor::new("optOut", "Toggles opt out of auto-invites", Common, CommandHandler::suspending(OptOutHandler)),
        CommandDescriptor::new("markAllRead", "Marks all messages as read", Common, CommandHandler::suspending(MarkAllReadHandler)),
        CommandDescriptor::new("reqInvite", "Requests an invite to a world", Common, CommandHandler::suspending(ReqInviteHandler))
            .usage("[?world name...]")
            .aliases(&["requestInvite"]),
        CommandDescriptor::new("getSessionOrb", "Get session orb", Common, CommandHandler::suspending(GetSessionOrbHandler))
            .usage("[?world name...]"),
        CommandDescriptor::new("worlds", "List all worlds", Common, CommandHandler::suspending(WorldsHandler)),
        CommandDescriptor::new("owo", "owo command", Common, CommandHandler::sync(OwoHandler)),
        // World side effects
        CommandDescriptor::new("playTestSound", "Play a test sound", World, CommandHandler::sync(PlayTestSoundHandler))
            .requires(Moderator),
        CommandDescriptor::new("spawnBox", "Spawn a test box", World, CommandHandler::sync(SpawnBoxHandler))
            .requires(Moderator),
        CommandDescriptor::new("explode", "Make an explode owo", World, CommandHandler::sync(ExplodeHandler))
            .requires(Moderator),
        CommandDescriptor::new("bigger", "Make a user bigger", World, CommandHandler::sync(BiggerHandler))
            .usage("[?userName...]")
            .requires(Moderator),
        CommandDescriptor::new("smaller", "Make a user smaller", World, CommandHandler::sync(SmallerHandler))
            .usage("[?userName...]")
            .requires(Moderator),
        // Debug
        CommandDescriptor::new("echoNext", "Echoes your next message back", Debug, CommandHandler::suspending(EchoNextHandler))
            .requires(Moderator),
        CommandDescriptor::new("throwErr", "Throw Error", Debug, CommandHandler::sync(ThrowErrHandler))
            .requires(Owner),
        CommandDescriptor::new("throwErrAsync", "Throw Error Asynchronously", Debug, CommandHandler::suspending(ThrowErrAsyncHandler))
            .requires(Owner),
    ]
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Name/alias → descriptor mapping. Populated before serving, read-only afterwards.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Vec<CommandDescriptor>,
    /// Lowercase name or alias → index into `commands`.
    index: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in catalog.
    pub fn with_builtins() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for def in builtin_commands() {
            registry.register(def)?;
        }
        Ok(registry)
    }

    /// Register a command. Fails without side effects if its name or any
    /// alias is already taken (case-insensitive).
    pub fn register(&mut self, def: CommandDescriptor) -> Result<(), RegistryError> {
        if def.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let keys = def.lookup_keys();
        let mut seen = HashSet::new();
        for key in &keys {
            if key.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if self.index.contains_key(key) || !seen.insert(key.as_str()) {
                return Err(RegistryError::DuplicateName(key.clone()));
            }
        }

        let slot = self.commands.len();
        for key in keys {
            self.index.insert(key, slot);
        }
        self.commands.push(def);
        Ok(())
    }

    /// Case-insensitive lookup by canonical name or alias.
    pub fn resolve(&self, token: &str) -> Option<&CommandDescriptor> {
        self.index
            .get(&token.to_lowercase())
            .and_then(|&slot| self.commands.get(slot))
    }

    /// Canonical entries visible at `level`, in registration order.
    pub fn list(&self, level: PermissionLevel) -> Vec<&CommandDescriptor> {
        self.commands
            .iter()
            .filter(|c| c.required_permission <= level)
            .collect()
    }

    pub fn all(&self) -> &[CommandDescriptor] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
