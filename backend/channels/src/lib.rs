use async_trait::async_trait;
use cmdrelay_core::InboundMessage;
use tokio::sync::mpsc;

pub mod console;

pub use console::ConsoleAdapter;

/// All channel adapters implement this trait.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Human-readable adapter name for logging.
    fn name(&self) -> &str;

    /// Run the adapter's receive loop, forwarding every inbound message.
    /// Returns when the transport closes.
    async fn start(&self, inbound_tx: mpsc::Sender<InboundMessage>) -> anyhow::Result<()>;
}
