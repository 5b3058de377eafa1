/// Batched replies: pack many short lines into as few messages as possible.
use std::sync::Arc;

use cmdrelay_core::{ConversationKey, MessagingService};

/// Default character budget for one batched message.
pub const DEFAULT_BATCH_MAX_CHARS: usize = 1000;

pub struct BatchReply {
    messaging: Arc<dyn MessagingService>,
    to: ConversationKey,
    max_chars: usize,
    messages: Vec<String>,
    current: String,
}

impl BatchReply {
    pub fn new(messaging: Arc<dyn MessagingService>, to: ConversationKey, max_chars: usize) -> Self {
        Self {
            messaging,
            to,
            max_chars: max_chars.max(1),
            messages: Vec::new(),
            current: String::new(),
        }
    }

    /// Append an entry. An entry (which may span several lines) is never split;
    /// if it does not fit in the current message a new one is started.
    pub fn push_entry(&mut self, entry: impl Into<String>) {
        let entry = entry.into();
        if self.current.is_empty() {
            self.current = entry;
            return;
        }
        let needed = self.current.chars().count() + 1 + entry.chars().count();
        if needed > self.max_chars {
            self.messages.push(std::mem::take(&mut self.current));
            self.current = entry;
        } else {
            self.current.push('\n');
            self.current.push_str(&entry);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.current.is_empty()
    }

    /// The messages this batch would send, in order.
    pub fn into_messages(mut self) -> Vec<String> {
        if !self.current.is_empty() {
            self.messages.push(std::mem::take(&mut self.current));
        }
        self.messages
    }

    /// Send every message in order. Returns whether all were accepted.
    pub async fn send(self) -> bool {
        let messaging = Arc::clone(&self.messaging);
        let to = self.to.clone();
        let mut all_sent = true;
        for message in self.into_messages() {
            all_sent &= messaging.send_text(&to, &message).await;
        }
        all_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingMessenger;

    fn batch(max_chars: usize) -> (BatchReply, Arc<RecordingMessenger>) {
        let messenger = Arc::new(RecordingMessenger::default());
        let reply = BatchReply::new(messenger.clone(), ConversationKey::for_sender("U-alice"), max_chars);
        (reply, messenger)
    }

    #[test]
    fn test_lines_share_a_message_when_they_fit() {
        let (mut reply, _) = batch(100);
        reply.push_entry("one");
        reply.push_entry("two");
        assert_eq!(reply.into_messages(), vec!["one\ntwo"]);
    }

    #[test]
    fn test_overflow_starts_new_message() {
        let (mut reply, _) = batch(7);
        reply.push_entry("one");
        reply.push_entry("two");
        reply.push_entry("three");
        assert_eq!(reply.into_messages(), vec!["one\ntwo", "three"]);
    }

    #[test]
    fn test_entry_is_never_split() {
        let (mut reply, _) = batch(10);
        reply.push_entry("short");
        reply.push_entry("help - Shows this help message\nAliases: commands");
        let messages = reply.into_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], "help - Shows this help message\nAliases: commands");
    }

    #[tokio::test]
    async fn test_send_delivers_in_order() {
        let (mut reply, messenger) = batch(4);
        reply.push_entry("aaa");
        reply.push_entry("bbb");
        assert!(reply.send().await);
        assert_eq!(messenger.texts_to("U-alice"), vec!["aaa", "bbb"]);
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let (reply, messenger) = batch(10);
        assert!(reply.is_empty());
        assert!(reply.send().await);
        assert!(messenger.texts_to("U-alice").is_empty());
    }
}
