/// Per-invocation context handed to command bodies.
use std::sync::Arc;
use std::time::Duration;

use cmdrelay_core::{
    ConversationKey, InboundMessage, MessagingService, PermissionLevel, PermissionResolver,
    SettingsStore, StructuredPayload, WorldService,
};
use tokio::sync::mpsc;
use tracing::debug;

use crate::batch::BatchReply;
use crate::correlator::{ResponseCorrelator, WaitError};
use crate::registry::CommandRegistry;

/// External collaborators the dispatcher and command bodies call into.
#[derive(Clone)]
pub struct Services {
    pub messaging: Arc<dyn MessagingService>,
    pub permissions: Arc<dyn PermissionResolver>,
    pub world: Arc<dyn WorldService>,
    pub settings: Arc<dyn SettingsStore>,
}

/// Context passed to every command handler.
pub struct CommandContext {
    pub conversation: ConversationKey,
    pub sender_id: String,
    /// The caller's resolved permission level.
    pub permission: PermissionLevel,
    pub services: Services,
    registry: Arc<CommandRegistry>,
    correlator: ResponseCorrelator,
    outbox: mpsc::UnboundedSender<String>,
    batch_max_chars: usize,
    reply_timeout: Duration,
}

impl CommandContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        msg: &InboundMessage,
        permission: PermissionLevel,
        services: Services,
        registry: Arc<CommandRegistry>,
        correlator: ResponseCorrelator,
        outbox: mpsc::UnboundedSender<String>,
        batch_max_chars: usize,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            conversation: msg.conversation(),
            sender_id: msg.sender_id.clone(),
            permission,
            services,
            registry,
            correlator,
            outbox,
            batch_max_chars,
            reply_timeout,
        }
    }

    /// Send a text reply to the caller now.
    pub async fn reply(&self, text: &str) -> bool {
        self.services.messaging.send_text(&self.conversation, text).await
    }

    /// Queue a text reply; the dispatcher delivers queued replies in order
    /// after the command body returns.
    pub fn queue_reply(&self, text: impl Into<String>) {
        if self.outbox.send(text.into()).is_err() {
            debug!(conversation = %self.conversation, "Outbox closed; queued reply dropped");
        }
    }

    pub async fn send_structured(&self, payload: StructuredPayload) -> bool {
        self.services.messaging.send_structured(&self.conversation, payload).await
    }

    /// Start a batched reply to the caller.
    pub fn batch(&self) -> BatchReply {
        BatchReply::new(
            Arc::clone(&self.services.messaging),
            self.conversation.clone(),
            self.batch_max_chars,
        )
    }

    /// The registry this command was dispatched from.
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Suspend until the caller sends their next message, or `timeout` elapses.
    ///
    /// The reply is consumed by this wait and never dispatched as a command.
    pub async fn await_reply(&self, timeout: Duration) -> Result<InboundMessage, WaitError> {
        self.correlator.next_message_within(&self.conversation, timeout).await
    }

    /// Configured timeout for multi-turn prompts.
    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }
}
