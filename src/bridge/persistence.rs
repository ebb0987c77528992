//! Mirrors the chat widget's transient message stream into the store.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{ErrorContext, SyncError};
use crate::models::{Conversation, MessageContent, MessageRole, StreamMessage, StreamRole};
use crate::traits::{ConversationStore, MessageStream};

use super::tracker::PersistenceTracker;

/// Metadata key holding the originating stream message id.
pub const STREAM_MESSAGE_ID_KEY: &str = "copilot_message_id";

/// Metadata key holding the capture timestamp (RFC 3339).
pub const CAPTURE_TIMESTAMP_KEY: &str = "timestamp";

/// What one pass over the stream did.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Ids marked seen by the snapshot phase
    pub snapshot_marked: usize,
    /// Ids persisted in this pass, in stream order
    pub persisted: Vec<String>,
    /// System messages skipped and marked seen
    pub skipped_system: usize,
    /// Messages without text, left unseen
    pub skipped_empty: usize,
    /// One `PersistenceSkipped` per failed persist
    pub failures: Vec<SyncError>,
}

impl PassReport {
    pub fn is_noop(&self) -> bool {
        self.snapshot_marked == 0
            && self.persisted.is_empty()
            && self.skipped_system == 0
            && self.skipped_empty == 0
            && self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
struct Activation {
    conversation_id: Option<i64>,
    thread_id: Option<String>,
    enabled: bool,
    /// Bumped on every identity change so late persists of a previous
    /// activation leave the new tracker alone.
    generation: u64,
    tracker: PersistenceTracker,
}

/// Stream role to store role. Anything that is not the assistant is
/// attributed to the user.
pub fn store_role(role: StreamRole) -> MessageRole {
    match role {
        StreamRole::Assistant => MessageRole::Assistant,
        StreamRole::User | StreamRole::System | StreamRole::Other => MessageRole::User,
    }
}

/// Stored content for a stream message: its text plus the originating id
/// and capture time.
pub fn stored_content(message: &StreamMessage) -> MessageContent {
    let mut metadata = Map::new();
    metadata.insert(
        STREAM_MESSAGE_ID_KEY.to_string(),
        Value::String(message.id.clone()),
    );
    metadata.insert(
        CAPTURE_TIMESTAMP_KEY.to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    MessageContent::with_metadata(message.content_text(), metadata)
}

/// Forwards newly appended stream messages to the store, once each.
///
/// Messages already present when a conversation is activated are treated
/// as loaded history and never written.
pub struct PersistenceBridge {
    store: Arc<dyn ConversationStore>,
    stream: Arc<dyn MessageStream>,
    initial_context: Option<String>,
    activation: Mutex<Activation>,
}

impl PersistenceBridge {
    pub fn new(store: Arc<dyn ConversationStore>, stream: Arc<dyn MessageStream>) -> Self {
        Self {
            store,
            stream,
            initial_context: None,
            activation: Mutex::new(Activation::default()),
        }
    }

    /// Context handed to the widget once per conversation switch.
    pub fn with_initial_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.initial_context = if context.trim().is_empty() {
            None
        } else {
            Some(context)
        };
        self
    }

    fn activation(&self) -> MutexGuard<'_, Activation> {
        self.activation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn stream(&self) -> &Arc<dyn MessageStream> {
        &self.stream
    }

    /// Point the bridge at `conversation`.
    ///
    /// A different conversation identity clears the tracker, re-enters the
    /// snapshot phase and injects the initial context, whether or not
    /// persistence is enabled. Toggling `enabled` alone keeps the tracker.
    pub fn activate(&self, conversation: Option<&Conversation>, enabled: bool) {
        let conversation_id = conversation.map(|c| c.conversation_id);
        let inject_into = {
            let mut activation = self.activation();
            activation.enabled = enabled;
            if activation.conversation_id == conversation_id {
                return;
            }
            activation.conversation_id = conversation_id;
            activation.thread_id = conversation.map(|c| c.thread_id.clone());
            activation.generation += 1;
            activation.tracker.reset();
            tracing::debug!(
                "Bridge activated for conversation {:?} (enabled={})",
                conversation_id,
                enabled
            );
            activation.thread_id.clone()
        };

        if let (Some(thread_id), Some(context)) = (inject_into, &self.initial_context) {
            self.stream.inject_context(&thread_id, context);
        }
    }

    /// Stop persisting and forget the tracker.
    pub fn deactivate(&self) {
        self.activate(None, false);
    }

    pub fn conversation_id(&self) -> Option<i64> {
        self.activation().conversation_id
    }

    pub fn is_enabled(&self) -> bool {
        self.activation().enabled
    }

    pub fn in_snapshot_phase(&self) -> bool {
        !self.activation().tracker.snapshot_consumed()
    }

    pub fn seen_count(&self) -> usize {
        self.activation().tracker.seen_count()
    }

    /// One pass over the full current stream.
    ///
    /// Persists, in stream order, every message that is neither seen nor
    /// in flight. A message becomes seen only after its write succeeds; a
    /// failed write leaves it for the next pass and does not stop the rest.
    pub async fn on_stream_changed(&self, messages: &[StreamMessage]) -> PassReport {
        let mut report = PassReport::default();

        let (conversation_id, generation, work) = {
            let mut activation = self.activation();
            let Some(conversation_id) = activation.conversation_id else {
                return report;
            };
            if !activation.enabled {
                return report;
            }

            if !activation.tracker.snapshot_consumed() {
                if !messages.is_empty() {
                    report.snapshot_marked = activation.tracker.consume_snapshot(messages);
                    tracing::debug!(
                        "Snapshot of {} stream messages for conversation {}",
                        report.snapshot_marked,
                        conversation_id
                    );
                }
                return report;
            }

            let mut work = Vec::new();
            for message in messages {
                if !activation.tracker.is_pending(&message.id) {
                    continue;
                }
                if message.role == StreamRole::System {
                    activation.tracker.mark_seen(&message.id);
                    report.skipped_system += 1;
                    continue;
                }
                if message.content_text().trim().is_empty() {
                    report.skipped_empty += 1;
                    continue;
                }
                activation.tracker.claim(&message.id);
                work.push(message.clone());
            }
            (conversation_id, activation.generation, work)
        };

        for message in work {
            let content = stored_content(&message);
            let result = self
                .store
                .create_message(conversation_id, store_role(message.role), &content)
                .await;

            let mut activation = self.activation();
            let current = activation.generation == generation;
            match result {
                Ok(stored) => {
                    if current {
                        activation.tracker.complete(&message.id);
                    }
                    tracing::debug!(
                        "Persisted stream message {} as message {}",
                        message.id,
                        stored.message_id
                    );
                    report.persisted.push(message.id);
                }
                Err(reason) => {
                    if current {
                        activation.tracker.release(&message.id);
                    }
                    let err = SyncError::PersistenceSkipped {
                        stream_message_id: message.id.clone(),
                        reason,
                    }
                    .with_context(
                        ErrorContext::new("persist_stream_message")
                            .with_conversation_id(conversation_id),
                    );
                    tracing::warn!("[{}] {}", err.error_code(), err);
                    report.failures.push(err);
                }
            }
        }

        if !report.is_noop() {
            tracing::debug!(
                "Bridge pass: persisted={} failed={} system={} empty={}",
                report.persisted.len(),
                report.failures.len(),
                report.skipped_system,
                report.skipped_empty
            );
        }
        report
    }

    /// Run a pass for the current value and every later change of `rx`
    /// until the sender is dropped.
    pub async fn run(self: Arc<Self>, mut rx: watch::Receiver<Vec<StreamMessage>>) {
        loop {
            let messages = rx.borrow_and_update().clone();
            self.on_stream_changed(&messages).await;
            if rx.changed().await.is_err() {
                tracing::debug!("Message stream closed; bridge stopping");
                break;
            }
        }
    }

    /// Subscribe to the stream and run the bridge on a background task.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let rx = self.stream.subscribe();
        tokio::spawn(Arc::clone(self).run(rx))
    }
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge")
            .field("activation", &*self.activation())
            .field("initial_context", &self.initial_context)
            .finish()
    }
}
