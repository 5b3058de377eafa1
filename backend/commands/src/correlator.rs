//! Pending-response correlation: lets a caller await the next inbound message
//! of a conversation before normal command dispatch sees it.
//!
//! At most one wait exists per conversation. `try_claim` removes the wait from
//! the table under the lock and only then hands the message to the waiter, so
//! two racing claims for the same key can never both deliver.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use cmdrelay_core::{ConversationKey, InboundMessage};
use thiserror::Error;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

/// Why a pending wait ended without a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("wait was cancelled")]
    Cancelled,
    #[error("wait was replaced by a newer wait for the same conversation")]
    Superseded,
    #[error("correlator was shut down")]
    Closed,
    #[error("no reply within {0:?}")]
    TimedOut(Duration),
}

type WaitResult = Result<InboundMessage, WaitError>;

struct PendingWait {
    id: u64,
    tx: oneshot::Sender<WaitResult>,
}

/// Suspension handle returned by [`ResponseCorrelator::await_next`].
///
/// Resolves with the claimed message, or with the reason the wait ended.
pub struct PendingResponse {
    id: u64,
    conversation: ConversationKey,
    rx: oneshot::Receiver<WaitResult>,
}

impl PendingResponse {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn conversation(&self) -> &ConversationKey {
        &self.conversation
    }
}

impl Future for PendingResponse {
    type Output = WaitResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(WaitError::Closed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Table of pending waits keyed by conversation. Cheap to clone; clones share the table.
#[derive(Clone, Default)]
pub struct ResponseCorrelator {
    pending: Arc<Mutex<HashMap<ConversationKey, PendingWait>>>,
    next_id: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wait for the next message in `conversation`.
    ///
    /// A live wait already registered for the same conversation is replaced
    /// and resolves with [`WaitError::Superseded`].
    pub async fn await_next(&self, conversation: &ConversationKey) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let previous = {
            let mut pending = self.pending.lock().await;
            if self.closed.load(Ordering::Acquire) {
                let _ = tx.send(Err(WaitError::Closed));
                None
            } else {
                pending.insert(conversation.clone(), PendingWait { id, tx })
            }
        };

        if let Some(previous) = previous {
            if !previous.tx.is_closed() {
                warn!(conversation = %conversation, replaced = previous.id, "Replacing outstanding wait");
                let _ = previous.tx.send(Err(WaitError::Superseded));
            }
        }

        debug!(conversation = %conversation, wait_id = id, "Awaiting next message");
        PendingResponse {
            id,
            conversation: conversation.clone(),
            rx,
        }
    }

    /// Offer an inbound message to the waiter of `conversation`.
    ///
    /// Returns `true` when a waiter took the message; dispatch must stop.
    /// A wait whose handle was dropped is discarded and does not claim.
    pub async fn try_claim(&self, conversation: &ConversationKey, message: &InboundMessage) -> bool {
        let waiter = self.pending.lock().await.remove(conversation);
        let Some(waiter) = waiter else {
            return false;
        };

        match waiter.tx.send(Ok(message.clone())) {
            Ok(()) => {
                debug!(conversation = %conversation, wait_id = waiter.id, "Message claimed by waiter");
                true
            }
            Err(_) => {
                debug!(conversation = %conversation, wait_id = waiter.id, "Waiter gone; message passes through");
                false
            }
        }
    }

    /// Remove the wait for `conversation`, if any. The waiter sees [`WaitError::Cancelled`].
    pub async fn cancel(&self, conversation: &ConversationKey) -> bool {
        let waiter = self.pending.lock().await.remove(conversation);
        match waiter {
            Some(waiter) => {
                debug!(conversation = %conversation, wait_id = waiter.id, "Wait cancelled");
                let _ = waiter.tx.send(Err(WaitError::Cancelled));
                true
            }
            None => false,
        }
    }

    /// Cancel only if the registered wait is still the one with `id`.
    async fn cancel_wait(&self, conversation: &ConversationKey, id: u64) -> bool {
        let waiter = {
            let mut pending = self.pending.lock().await;
            match pending.get(conversation) {
                Some(w) if w.id == id => pending.remove(conversation),
                _ => None,
            }
        };
        match waiter {
            Some(waiter) => {
                let _ = waiter.tx.send(Err(WaitError::Cancelled));
                true
            }
            None => false,
        }
    }

    /// Wait for the next message in `conversation`, giving up after `timeout`.
    ///
    /// On timeout only this call's own wait is removed; a wait registered
    /// later by someone else is left alone.
    pub async fn next_message_within(
        &self,
        conversation: &ConversationKey,
        timeout: Duration,
    ) -> WaitResult {
        let mut pending = self.await_next(conversation).await;
        match tokio::time::timeout(timeout, &mut pending).await {
            Ok(result) => result,
            Err(_) => {
                if self.cancel_wait(conversation, pending.id()).await {
                    debug!(conversation = %conversation, "Wait timed out");
                    Err(WaitError::TimedOut(timeout))
                } else {
                    // Claimed or replaced between the deadline and the cancel;
                    // the sender side already resolved the handle.
                    pending.await
                }
            }
        }
    }

    /// Resolve every outstanding wait with [`WaitError::Closed`] and refuse new
    /// ones the same way. Returns how many waits were live.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock().await;
            self.closed.store(true, Ordering::Release);
            pending.drain().collect()
        };
        let mut closed = 0;
        for (conversation, waiter) in drained {
            if waiter.tx.send(Err(WaitError::Closed)).is_ok() {
                debug!(conversation = %conversation, wait_id = waiter.id, "Wait closed");
                closed += 1;
            }
        }
        closed
    }

    pub async fn is_waiting(&self, conversation: &ConversationKey) -> bool {
        self.pending.lock().await.contains_key(conversation)
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
