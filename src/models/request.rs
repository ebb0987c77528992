use serde::{Deserialize, Serialize};

use super::message::{MessageContent, MessageRole};

/// Body of `POST /conversations`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateConversationRequest {
    pub user_id: i64,
    pub title: String,
}

/// Partial update for `PATCH /conversations/{id}`.
///
/// Unset fields are left out of the body so the store leaves them alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl ConversationUpdate {
    /// Update that renames the conversation.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            is_active: None,
        }
    }

    /// Update that flips the soft-delete flag.
    pub fn active(is_active: bool) -> Self {
        Self {
            title: None,
            is_active: Some(is_active),
        }
    }

    /// True when no field would be sent.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.is_active.is_none()
    }
}

/// Body of `POST /messages`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateMessageRequest {
    pub conversation_id: i64,
    pub role: MessageRole,
    pub content: MessageContent,
}

/// Response of `GET /messages/count/{conversation_id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageCountResponse {
    #[serde(default)]
    pub conversation_id: Option<i64>,
    pub message_count: u64,
}
