pub mod channel;
pub mod error;
pub mod message;
pub mod permission;
pub mod traits;
pub mod types;

pub use channel::InboundBus;
pub use error::RelayError;
pub use message::{ConversationKey, InboundMessage, MessageKind, StructuredPayload};
pub use permission::{PermissionLevel, PermissionResolver};
pub use traits::{Component, MessagingService, SettingsStore, WorldService};
pub use types::{AccessLevel, UserQuery, WorldInfo, WorldUser};
