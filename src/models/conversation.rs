use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{deserialize_nullable_string, deserialize_timestamp};

/// Title given to conversations created without one
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

fn default_active() -> bool {
    true
}

/// A persisted conversation owned by one user.
///
/// `thread_id` is the chat widget's correlation id for this conversation.
/// It is assigned by the store on creation and never changes; it is the only
/// key that can resume a widget session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    /// Primary key assigned by the store
    pub conversation_id: i64,
    /// Owner of the conversation
    pub user_id: i64,
    /// User-facing title
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub title: String,
    /// Chat widget correlation id (unique, immutable)
    pub thread_id: String,
    /// When the conversation was created
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    /// Bumped by the store whenever the conversation or its messages change
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub updated_at: DateTime<Utc>,
    /// False once soft-deleted
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Conversation {
    /// Title to display, falling back to the default for untitled rows.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            DEFAULT_CONVERSATION_TITLE
        } else {
            &self.title
        }
    }
}
