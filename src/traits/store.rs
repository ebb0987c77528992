//! Conversation store trait abstraction.
//!
//! One method per remote operation. The HTTP client in [`crate::store`]
//! is the production implementation; [`crate::adapters::mock::InMemoryStore`]
//! backs the session tests.

use async_trait::async_trait;

use crate::error::RequestError;
use crate::models::{Conversation, ConversationUpdate, Message, MessageContent, MessageRole};

/// Remote CRUD service for conversations and their messages.
///
/// Every method fails with a [`RequestError`] when the remote call does not
/// report success. Implementations never retry.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a conversation; the store assigns its id and thread id.
    async fn create_conversation(
        &self,
        user_id: i64,
        title: &str,
    ) -> Result<Conversation, RequestError>;

    /// List a user's conversations, most recently updated first.
    async fn list_conversations(
        &self,
        user_id: i64,
        include_inactive: bool,
    ) -> Result<Vec<Conversation>, RequestError>;

    async fn get_conversation(&self, conversation_id: i64) -> Result<Conversation, RequestError>;

    async fn get_conversation_by_thread(
        &self,
        thread_id: &str,
    ) -> Result<Conversation, RequestError>;

    /// Apply a partial update and return the updated row.
    async fn update_conversation(
        &self,
        conversation_id: i64,
        update: &ConversationUpdate,
    ) -> Result<Conversation, RequestError>;

    /// Delete a conversation. `soft` marks it inactive instead of removing it.
    async fn delete_conversation(&self, conversation_id: i64, soft: bool)
        -> Result<(), RequestError>;

    async fn create_message(
        &self,
        conversation_id: i64,
        role: MessageRole,
        content: &MessageContent,
    ) -> Result<Message, RequestError>;

    /// List messages in ascending creation order.
    async fn list_messages(
        &self,
        conversation_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, RequestError>;

    async fn get_message(&self, message_id: i64) -> Result<Message, RequestError>;

    async fn count_messages(&self, conversation_id: i64) -> Result<u64, RequestError>;

    async fn delete_message(&self, message_id: i64) -> Result<(), RequestError>;

    async fn delete_all_messages(&self, conversation_id: i64) -> Result<(), RequestError>;
}
