//! Messages as the chat widget's in-memory stream presents them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a stream message. Anything the widget invents beyond the
/// three roles we care about lands in `Other`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StreamRole {
    User,
    Assistant,
    System,
    #[serde(other)]
    Other,
}

/// One entry of the transient widget stream.
///
/// `content` is usually a string but the widget may hand over structured
/// payloads (tool calls, render blocks), hence the raw JSON value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamMessage {
    pub id: String,
    pub role: StreamRole,
    #[serde(default)]
    pub content: Value,
}

impl StreamMessage {
    pub fn new(id: impl Into<String>, role: StreamRole, content: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
        }
    }

    pub fn user(id: impl Into<String>, text: &str) -> Self {
        Self::new(id, StreamRole::User, text)
    }

    pub fn assistant(id: impl Into<String>, text: &str) -> Self {
        Self::new(id, StreamRole::Assistant, text)
    }

    pub fn system(id: impl Into<String>, text: &str) -> Self {
        Self::new(id, StreamRole::System, text)
    }

    /// Content rendered as text: strings as-is, null as empty, anything
    /// else serialized to JSON.
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}
