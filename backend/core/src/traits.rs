use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::message::{ConversationKey, InboundMessage, StructuredPayload};
use crate::types::{UserQuery, WorldInfo, WorldUser};

/// Trait for long-running runtime components (the dispatcher loop, adapters).
///
/// Each component consumes inbound messages from its channel in its own Tokio task.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Human-readable name of this component.
    fn name(&self) -> &str;

    /// Start the component's event loop, consuming from the given receiver.
    async fn start(&self, rx: mpsc::Receiver<InboundMessage>) -> Result<()>;
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Send a plain text message. Returns whether the transport accepted it.
    async fn send_text(&self, to: &ConversationKey, text: &str) -> bool;

    /// Send a non-text payload (invite, object).
    async fn send_structured(&self, to: &ConversationKey, payload: StructuredPayload) -> bool;

    /// Mark a single inbound message as read.
    async fn mark_read(&self, message_id: &str);

    /// Mark every message in a conversation as read.
    async fn mark_all_read(&self, conversation: &ConversationKey);
}

/// World/session runtime used by command bodies.
///
/// Mutating calls only schedule the change on the world's own update context;
/// they return before it is applied.
pub trait WorldService: Send + Sync {
    /// Joinable world sessions, in stable order. Excludes the host's private userspace.
    fn worlds(&self) -> Vec<WorldInfo>;

    /// The world the host currently has focused.
    fn focused_world(&self) -> Option<WorldInfo>;

    /// The world a given user is currently in, if any.
    fn world_of_user(&self, user_id: &str) -> Option<WorldInfo>;

    fn can_user_join(&self, world: &WorldInfo, user_id: &str) -> bool;

    fn allow_user_to_join(&self, world: &WorldInfo, user_id: &str);

    fn find_user(&self, world: &WorldInfo, query: &UserQuery) -> Option<WorldUser>;

    /// Multiply a user's avatar scale, animated over `seconds`.
    fn scale_user(&self, world: &WorldInfo, user: &WorldUser, factor: f32, seconds: f32);

    fn play_test_sound(&self, world: &WorldInfo);

    fn spawn_box(&self, world: &WorldInfo);

    fn spawn_explosion(&self, world: &WorldInfo);

    /// Build a session orb for the world, if the world can produce one.
    fn session_orb(&self, world: &WorldInfo) -> Option<serde_json::Value>;
}

/// Persistent per-user settings touched by commands.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Flip the user's auto-invite opt-out flag and persist it.
    /// Returns `true` when the user is now opted out.
    async fn toggle_auto_invite_opt_out(&self, user_id: &str) -> Result<bool>;

    async fn is_opted_out(&self, user_id: &str) -> bool;
}
