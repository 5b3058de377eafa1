use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::message::InboundMessage;

/// Default channel buffer size for the inbound message stream.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// The inbound message stream connecting channel adapters to the dispatcher.
///
/// Adapters clone `inbound_tx`; the dispatcher takes the single receiver.
/// Built on a bounded Tokio mpsc channel for backpressure.
pub struct InboundBus {
    pub inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: Option<mpsc::Receiver<InboundMessage>>,
}

impl InboundBus {
    /// Create a new bus with the default buffer size.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new bus with a custom buffer size.
    pub fn with_buffer_size(buffer: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(buffer);
        info!(buffer_size = buffer, "InboundBus initialized");
        Self {
            inbound_tx,
            inbound_rx: Some(inbound_rx),
        }
    }

    /// Take the receiver (can only be called once).
    pub fn take_inbound_rx(&mut self) -> Option<mpsc::Receiver<InboundMessage>> {
        debug!("Inbound receiver taken");
        self.inbound_rx.take()
    }
}

impl Default for InboundBus {
    fn default() -> Self {
        Self::new()
    }
}
