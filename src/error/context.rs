//! Error context for enriched error information.

use chrono::{DateTime, Utc};

/// Context attached to errors for logging: which operation failed and on
/// which conversation or thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorContext {
    /// Human-readable name of the operation that failed.
    pub operation: String,

    /// Widget thread id, when the operation targeted one.
    pub thread_id: Option<String>,

    /// Store conversation id, when the operation targeted one.
    pub conversation_id: Option<i64>,

    /// Timestamp when the error occurred.
    pub timestamp: DateTime<Utc>,
}

impl ErrorContext {
    /// Create a new ErrorContext for an operation.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            thread_id: None,
            conversation_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the thread ID for this context.
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Set the conversation ID for this context.
    pub fn with_conversation_id(mut self, conversation_id: i64) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    /// Get a formatted context string suitable for logging.
    pub fn to_log_string(&self) -> String {
        let mut parts = vec![format!("operation={}", self.operation)];

        if let Some(ref thread_id) = self.thread_id {
            parts.push(format!("thread_id={}", thread_id));
        }

        if let Some(conversation_id) = self.conversation_id {
            parts.push(format!("conversation_id={}", conversation_id));
        }

        parts.push(format!("timestamp={}", self.timestamp.to_rfc3339()));

        parts.join(" ")
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.operation)?;

        if let Some(conversation_id) = self.conversation_id {
            write!(f, " conversation={}", conversation_id)?;
        }

        if let Some(ref thread_id) = self.thread_id {
            write!(f, " thread={}", thread_id)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder_pattern() {
        let ctx = ErrorContext::new("select_conversation")
            .with_thread_id("thread_abc")
            .with_conversation_id(9);

        assert_eq!(ctx.operation, "select_conversation");
        assert_eq!(ctx.thread_id.as_deref(), Some("thread_abc"));
        assert_eq!(ctx.conversation_id, Some(9));
    }

    #[test]
    fn test_context_display() {
        let ctx = ErrorContext::new("load_messages")
            .with_conversation_id(3)
            .with_thread_id("thread_xyz");

        let display = format!("{}", ctx);
        assert!(display.contains("load_messages"));
        assert!(display.contains("conversation=3"));
        assert!(display.contains("thread=thread_xyz"));
    }

    #[test]
    fn test_context_display_minimal() {
        let display = format!("{}", ErrorContext::new("simple_op"));
        assert_eq!(display, "[simple_op]");
    }

    #[test]
    fn test_context_to_log_string() {
        let log_str = ErrorContext::new("persist_message")
            .with_conversation_id(4)
            .to_log_string();
        assert!(log_str.contains("operation=persist_message"));
        assert!(log_str.contains("conversation_id=4"));
        assert!(log_str.contains("timestamp="));
        assert!(!log_str.contains("thread_id"));
    }
}
