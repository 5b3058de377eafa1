/// Console adapter: stdin lines in, replies printed to stdout.
///
/// Each input line becomes one text message from the default sender. A line
/// of the form `@<sender> <text>` is sent as `<sender>` instead, which makes
/// it possible to try permission-gated commands from one terminal.
use anyhow::Result;
use async_trait::async_trait;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdout},
    sync::{Mutex, mpsc},
};
use tracing::{debug, info, warn};

use cmdrelay_core::{ConversationKey, InboundMessage, MessagingService, StructuredPayload};

use crate::ChannelAdapter;

pub struct ConsoleAdapter<W = Stdout> {
    default_sender: String,
    out: Mutex<W>,
}

impl ConsoleAdapter<Stdout> {
    pub fn new(default_sender: impl Into<String>) -> Self {
        Self::with_writer(default_sender, tokio::io::stdout())
    }
}

impl<W> ConsoleAdapter<W>
where
    W: AsyncWrite + Send + Unpin,
{
    pub fn with_writer(default_sender: impl Into<String>, writer: W) -> Self {
        Self {
            default_sender: default_sender.into(),
            out: Mutex::new(writer),
        }
    }

    /// Parse one input line. Blank lines yield nothing.
    pub fn parse_line(&self, line: &str) -> Option<InboundMessage> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        if let Some(rest) = line.strip_prefix('@') {
            let (sender, text) = rest.split_once(' ').unwrap_or((rest, ""));
            if !sender.is_empty() && !text.is_empty() {
                return Some(InboundMessage::text(sender, text));
            }
        }
        Some(InboundMessage::text(self.default_sender.as_str(), line))
    }

    /// Forward every line of `reader` until EOF or until the receiver is gone.
    pub async fn pump<R>(&self, reader: R, inbound_tx: &mpsc::Sender<InboundMessage>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let Some(msg) = self.parse_line(&line) else { continue };
            debug!(sender_id = %msg.sender_id, "Console input");
            if inbound_tx.send(msg).await.is_err() {
                warn!("Inbound channel closed; console input stopped");
                break;
            }
        }
        Ok(())
    }

    async fn write_line(&self, line: &str) -> bool {
        let mut out = self.out.lock().await;
        let framed = format!("{line}\n");
        if let Err(e) = out.write_all(framed.as_bytes()).await {
            warn!(error = %e, "Console write failed");
            return false;
        }
        if let Err(e) = out.flush().await {
            warn!(error = %e, "Console flush failed");
            return false;
        }
        true
    }
}

#[async_trait]
impl<W> ChannelAdapter for ConsoleAdapter<W>
where
    W: AsyncWrite + Send + Unpin,
{
    fn name(&self) -> &str {
        "console"
    }

    async fn start(&self, inbound_tx: mpsc::Sender<InboundMessage>) -> Result<()> {
        info!(sender_id = %self.default_sender, "Console channel reading stdin");
        self.pump(BufReader::new(tokio::io::stdin()), &inbound_tx).await?;
        info!("Console input closed");
        Ok(())
    }
}

#[async_trait]
impl<W> MessagingService for ConsoleAdapter<W>
where
    W: AsyncWrite + Send + Unpin,
{
    async fn send_text(&self, to: &ConversationKey, text: &str) -> bool {
        self.write_line(&format!("[{to}] {text}")).await
    }

    async fn send_structured(&self, to: &ConversationKey, payload: StructuredPayload) -> bool {
        match serde_json::to_string(&payload) {
            Ok(json) => self.write_line(&format!("[{to}] <{json}>")).await,
            Err(e) => {
                warn!(error = %e, "Unserializable payload");
                false
            }
        }
    }

    async fn mark_read(&self, message_id: &str) {
        debug!(message_id, "Marked read");
    }

    async fn mark_all_read(&self, conversation: &ConversationKey) {
        debug!(conversation = %conversation, "Marked conversation read");
    }
}
