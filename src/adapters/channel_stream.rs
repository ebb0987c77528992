//! Watch-channel backed message stream.
//!
//! The chat widget (or a test) writes the full message list through this
//! adapter; the persistence bridge subscribes to it.

use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

use crate::models::StreamMessage;
use crate::traits::MessageStream;

/// [`MessageStream`] over a `tokio::sync::watch` channel.
///
/// Context handed over with [`inject_context`](MessageStream::inject_context)
/// is appended to the list as a system message, which is how the widget
/// surfaces it.
#[derive(Debug)]
pub struct ChannelMessageStream {
    tx: watch::Sender<Vec<StreamMessage>>,
    injected: Mutex<Vec<(String, String)>>,
}

impl ChannelMessageStream {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            tx,
            injected: Mutex::new(Vec::new()),
        }
    }

    fn injected(&self) -> MutexGuard<'_, Vec<(String, String)>> {
        self.injected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the whole list (a widget remount or history replay).
    pub fn publish(&self, messages: Vec<StreamMessage>) {
        self.tx.send_replace(messages);
    }

    /// Append one message.
    pub fn push(&self, message: StreamMessage) {
        self.tx.send_modify(|list| list.push(message));
    }

    /// Replace the content of the message with `id`, as a streaming reply
    /// grows. Returns false if no such message exists.
    pub fn update(&self, id: &str, content: impl Into<serde_json::Value>) -> bool {
        let content = content.into();
        self.tx.send_if_modified(|list| {
            match list.iter_mut().find(|m| m.id == id) {
                Some(message) => {
                    message.content = content;
                    true
                }
                None => false,
            }
        })
    }

    /// Empty the list.
    pub fn clear(&self) {
        self.tx.send_replace(Vec::new());
    }

    /// Drain the `(thread_id, context)` pairs injected so far.
    pub fn take_injected(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *self.injected())
    }
}

impl Default for ChannelMessageStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStream for ChannelMessageStream {
    fn snapshot(&self) -> Vec<StreamMessage> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Vec<StreamMessage>> {
        self.tx.subscribe()
    }

    fn inject_context(&self, thread_id: &str, context: &str) {
        tracing::debug!("Injecting initial context into thread {}", thread_id);
        self.injected()
            .push((thread_id.to_string(), context.to_string()));
        self.push(StreamMessage::system(
            format!("context-{}", thread_id),
            context,
        ));
    }
}
