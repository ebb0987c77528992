//! Chat widget message stream abstraction.

use tokio::sync::watch;

use crate::models::StreamMessage;

/// Read side of the chat widget's transient, append-mostly message list.
///
/// Subscribers are handed the full current list on every change; the
/// persistence bridge diffs it against what it has already seen.
pub trait MessageStream: Send + Sync {
    /// The list as it is right now.
    fn snapshot(&self) -> Vec<StreamMessage>;

    /// Receiver that observes every change of the list.
    fn subscribe(&self) -> watch::Receiver<Vec<StreamMessage>>;

    /// Hand the widget initial conversational context for `thread_id`.
    fn inject_context(&self, thread_id: &str, context: &str);
}
