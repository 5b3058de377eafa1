/// Command dispatch: route inbound messages to command handlers.
///
/// Every inbound message goes through [`CommandDispatcher::handle_inbound_message`]:
/// read receipt, pending-wait claim, detection, lookup, permission gate, then
/// the handler. Nothing a handler does can escape this call.
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use cmdrelay_core::{Component, ConversationKey, InboundMessage};
use cmdrelay_logging::{CommandEvent, CommandEventLogger};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::batch::DEFAULT_BATCH_MAX_CHARS;
use crate::context::{CommandContext, Services};
use crate::correlator::{PendingResponse, ResponseCorrelator};
use crate::detection::detect_command;
use crate::registry::{CommandRegistry, RegistryError};
use crate::types::{CommandDescriptor, CommandHandler, join_args};

pub const UNKNOWN_COMMAND_REPLY: &str = "Unknown command";
pub const PERMISSION_DENIED_REPLY: &str = "You do not have permission to use that command.";

// ---------------------------------------------------------------------------
// Options and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub prefix: String,
    /// Send a read receipt for every inbound message.
    pub mark_read: bool,
    pub batch_max_chars: usize,
    /// How long multi-turn commands wait for the caller's reply.
    pub reply_timeout: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            prefix: "/".into(),
            mark_read: true,
            batch_max_chars: DEFAULT_BATCH_MAX_CHARS,
            reply_timeout: Duration::from_secs(60),
        }
    }
}

/// Terminal state of one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Consumed by a pending wait.
    Claimed,
    NotACommand,
    /// The command token as typed.
    UnknownCommand(String),
    PermissionDenied { command: String },
    Completed { command: String },
    Failed { command: String, message: String },
}

/// A handler that returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub command: String,
    /// Short message shown to the sender.
    pub message: String,
    /// Full error chain, for the log only.
    pub detail: String,
}

impl HandlerFailure {
    fn from_error(command: &str, err: &anyhow::Error) -> Self {
        Self {
            command: command.to_string(),
            message: err.to_string(),
            detail: format!("{err:#}"),
        }
    }

    fn from_panic(command: &str, payload: Box<dyn Any + Send>) -> Self {
        let message = panic_message(payload.as_ref());
        Self {
            command: command.to_string(),
            detail: format!("handler panicked: {message}"),
            message,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Startup-time assembly of a dispatcher. Registration is only possible here.
pub struct DispatcherBuilder {
    registry: CommandRegistry,
    services: Services,
    options: DispatchOptions,
    correlator: ResponseCorrelator,
}

impl DispatcherBuilder {
    pub fn new(services: Services) -> Self {
        Self {
            registry: CommandRegistry::new(),
            services,
            options: DispatchOptions::default(),
            correlator: ResponseCorrelator::new(),
        }
    }

    pub fn options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Share an existing correlator instead of creating one.
    pub fn correlator(mut self, correlator: ResponseCorrelator) -> Self {
        self.correlator = correlator;
        self
    }

    pub fn register_command(&mut self, def: CommandDescriptor) -> Result<(), RegistryError> {
        let name = def.name.clone();
        self.registry.register(def)?;
        debug!(command = %name, "Registered command");
        Ok(())
    }

    pub fn register_builtins(&mut self) -> Result<(), RegistryError> {
        for def in crate::registry::builtin_commands() {
            self.register_command(def)?;
        }
        Ok(())
    }

    pub fn build(self) -> CommandDispatcher {
        info!(commands = self.registry.len(), prefix = %self.options.prefix, "Command dispatcher ready");
        CommandDispatcher {
            registry: Arc::new(self.registry),
            correlator: self.correlator,
            services: self.services,
            options: Arc::new(self.options),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Cheap to clone; clones share the registry and the pending-wait table.
#[derive(Clone)]
pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
    correlator: ResponseCorrelator,
    services: Services,
    options: Arc<DispatchOptions>,
}

impl CommandDispatcher {
    pub fn builder(services: Services) -> DispatcherBuilder {
        DispatcherBuilder::new(services)
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn correlator(&self) -> &ResponseCorrelator {
        &self.correlator
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Suspend until the next message in `conversation` arrives. That
    /// message is handed to the waiter and not dispatched.
    pub async fn await_next_message(&self, conversation: &ConversationKey) -> PendingResponse {
        self.correlator.await_next(conversation).await
    }

    pub async fn cancel_await(&self, conversation: &ConversationKey) -> bool {
        self.correlator.cancel(conversation).await
    }

    /// Process one inbound message to completion. Never fails.
    pub async fn handle_inbound_message(&self, msg: &InboundMessage) -> DispatchOutcome {
        let messaging = &self.services.messaging;
        if self.options.mark_read {
            messaging.mark_read(&msg.id).await;
        }

        let conversation = msg.conversation();
        if self.correlator.try_claim(&conversation, msg).await {
            CommandEventLogger::log_event(
                &msg.sender_id,
                CommandEvent::Claimed { content: msg.content.clone() },
            );
            return DispatchOutcome::Claimed;
        }

        if !msg.is_text() {
            return DispatchOutcome::NotACommand;
        }
        let Some(invocation) = detect_command(&msg.content, &self.options.prefix) else {
            return DispatchOutcome::NotACommand;
        };

        let Some(descriptor) = self.registry.resolve(&invocation.name) else {
            debug!(sender_id = %msg.sender_id, token = %invocation.raw_name, "Unknown command");
            CommandEventLogger::log_event(
                &msg.sender_id,
                CommandEvent::Unknown { token: invocation.raw_name.clone() },
            );
            messaging.send_text(&conversation, UNKNOWN_COMMAND_REPLY).await;
            return DispatchOutcome::UnknownCommand(invocation.raw_name);
        };
        let command = descriptor.name.clone();

        let permission = self.services.permissions.check(&msg.sender_id);
        if descriptor.required_permission > permission {
            info!(
                sender_id = %msg.sender_id,
                command = %command,
                required = %descriptor.required_permission,
                actual = %permission,
                "Permission denied"
            );
            CommandEventLogger::log_event(
                &msg.sender_id,
                CommandEvent::Denied {
                    command: command.clone(),
                    required: descriptor.required_permission.to_string(),
                },
            );
            messaging.send_text(&conversation, PERMISSION_DENIED_REPLY).await;
            return DispatchOutcome::PermissionDenied { command };
        }

        info!(sender_id = %msg.sender_id, command = %command, "Dispatching command");
        let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
        let ctx = CommandContext::new(
            msg,
            permission,
            self.services.clone(),
            Arc::clone(&self.registry),
            self.correlator.clone(),
            outbox_tx,
            self.options.batch_max_chars,
            self.options.reply_timeout,
        );
        let args_text = join_args(&invocation.args);
        let result = invoke(descriptor, ctx, msg, invocation.args).await;

        // Replies queued by the body go out first, even when it failed.
        while let Ok(text) = outbox_rx.try_recv() {
            messaging.send_text(&conversation, &text).await;
        }

        match result {
            Ok(()) => {
                CommandEventLogger::log_event(
                    &msg.sender_id,
                    CommandEvent::Executed { command: command.clone(), args: args_text },
                );
                DispatchOutcome::Completed { command }
            }
            Err(failure) => {
                error!(
                    sender_id = %msg.sender_id,
                    command = %failure.command,
                    error = %failure.detail,
                    "Command failed"
                );
                CommandEventLogger::log_event(
                    &msg.sender_id,
                    CommandEvent::Failed {
                        command: command.clone(),
                        error: failure.detail.clone(),
                    },
                );
                messaging
                    .send_text(&conversation, &format!("Error: {}", failure.message))
                    .await;
                DispatchOutcome::Failed { command, message: failure.message }
            }
        }
    }
}

/// Run a handler to completion, converting errors and panics into a failure.
async fn invoke(
    descriptor: &CommandDescriptor,
    ctx: CommandContext,
    msg: &InboundMessage,
    args: Vec<String>,
) -> Result<(), HandlerFailure> {
    let command = descriptor.name.as_str();
    match &descriptor.handler {
        CommandHandler::Sync(body) => {
            match std::panic::catch_unwind(AssertUnwindSafe(|| body.run(&ctx, msg, &args))) {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(HandlerFailure::from_error(command, &err)),
                Err(payload) => Err(HandlerFailure::from_panic(command, payload)),
            }
        }
        CommandHandler::Async(body) => {
            let body = Arc::clone(body);
            let msg = msg.clone();
            let task = tokio::spawn(async move { body.run(&ctx, &msg, &args).await });
            match task.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(HandlerFailure::from_error(command, &err)),
                Err(join) if join.is_panic() => {
                    Err(HandlerFailure::from_panic(command, join.into_panic()))
                }
                Err(join) => Err(HandlerFailure {
                    command: command.to_string(),
                    message: "command was cancelled".to_string(),
                    detail: join.to_string(),
                }),
            }
        }
    }
}

#[async_trait]
impl Component for CommandDispatcher {
    fn name(&self) -> &str {
        "dispatcher"
    }

    /// Each message is handled on its own task so a command awaiting a reply
    /// never blocks delivery of that reply. Once the inbound channel closes,
    /// outstanding waits are closed and every in-flight handler is drained
    /// before returning.
    async fn start(&self, mut rx: mpsc::Receiver<InboundMessage>) -> Result<()> {
        info!("Dispatcher loop started");
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                received = rx.recv() => {
                    let Some(msg) = received else { break };
                    let dispatcher = self.clone();
                    in_flight.spawn(async move {
                        let outcome = dispatcher.handle_inbound_message(&msg).await;
                        debug!(message_id = %msg.id, outcome = ?outcome, "Message handled");
                    });
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join(joined);
                }
            }
        }

        let closed = self.correlator.close_all().await;
        info!(in_flight = in_flight.len(), closed_waits = closed, "Inbound channel closed; draining handlers");
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
        info!("Dispatcher loop exited");
        Ok(())
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Message task ended abnormally");
    }
}
