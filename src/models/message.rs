use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::deserialize_timestamp;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl MessageRole {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::Tool => "tool",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored message body: display text plus free-form metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MessageContent {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl MessageContent {
    /// Content with text only.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Map::new(),
        }
    }

    /// Content with text and metadata.
    pub fn with_metadata(text: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// Content as it may appear on the wire: a JSON object, or a bare string
/// left behind by older rows (possibly itself holding serialized JSON).
#[derive(Deserialize)]
#[serde(untagged)]
enum RawContent {
    Structured(MessageContent),
    Legacy(String),
}

fn deserialize_content<'de, D>(deserializer: D) -> Result<MessageContent, D::Error>
where
    D: Deserializer<'de>,
{
    match RawContent::deserialize(deserializer)? {
        RawContent::Structured(content) => Ok(content),
        RawContent::Legacy(raw) => {
            if raw.trim_start().starts_with('{') {
                if let Ok(content) = serde_json::from_str::<MessageContent>(&raw) {
                    return Ok(content);
                }
            }
            Ok(MessageContent::text(raw))
        }
    }
}

/// A persisted message. Append-only from the client's perspective.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Primary key assigned by the store
    pub message_id: i64,
    /// Owning conversation
    pub conversation_id: i64,
    pub role: MessageRole,
    #[serde(deserialize_with = "deserialize_content")]
    pub content: MessageContent,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Shortcut for the message text.
    pub fn text(&self) -> &str {
        &self.content.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&MessageRole::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&MessageRole::Assistant).unwrap(),
            "\"assistant\""
        );
        let role: MessageRole = serde_json::from_str("\"tool\"").unwrap();
        assert_eq!(role, MessageRole::Tool);
        assert!(serde_json::from_str::<MessageRole>("\"developer\"").is_err());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(MessageRole::System.to_string(), "system");
        assert_eq!(MessageRole::Tool.as_str(), "tool");
    }

    #[test]
    fn test_deserialize_structured_content() {
        let json = r#"{
            "message_id": 11,
            "conversation_id": 7,
            "role": "user",
            "content": {"text": "What is the leave policy?", "metadata": {"copilot_message_id": "m-1"}},
            "created_at": "2025-01-15T10:30:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.message_id, 11);
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.text(), "What is the leave policy?");
        assert_eq!(msg.content.metadata["copilot_message_id"], "m-1");
    }

    #[test]
    fn test_deserialize_legacy_string_content() {
        let json = r#"{
            "message_id": 12,
            "conversation_id": 7,
            "role": "assistant",
            "content": "plain reply",
            "created_at": "2025-01-15T10:30:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.text(), "plain reply");
        assert!(msg.content.metadata.is_empty());
    }

    #[test]
    fn test_deserialize_stringified_json_content() {
        let json = r#"{
            "message_id": 13,
            "conversation_id": 7,
            "role": "assistant",
            "content": "{\"text\": \"encoded\", \"metadata\": {\"k\": 1}}",
            "created_at": "2025-01-15T10:30:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.text(), "encoded");
        assert_eq!(msg.content.metadata["k"], 1);
    }

    #[test]
    fn test_content_without_text_defaults_empty() {
        let content: MessageContent =
            serde_json::from_str(r#"{"metadata": {"tool_calls": []}}"#).unwrap();
        assert_eq!(content.text, "");
        assert!(content.metadata.contains_key("tool_calls"));
    }
}
