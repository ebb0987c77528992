//! In-memory conversation store for testing.
//!
//! Mirrors the remote store's observable behavior: store-assigned ids and
//! thread ids, `updated_at` bumps on message writes, most-recent-first
//! listing and soft deletes. Failures and latency can be injected per
//! operation.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::RequestError;
use crate::models::{Conversation, ConversationUpdate, Message, MessageContent, MessageRole};
use crate::traits::ConversationStore;

/// Store operations, used to target failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    CreateConversation,
    ListConversations,
    GetConversation,
    GetConversationByThread,
    UpdateConversation,
    DeleteConversation,
    CreateMessage,
    ListMessages,
    GetMessage,
    CountMessages,
    DeleteMessage,
    DeleteAllMessages,
}

#[derive(Debug)]
struct Inner {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    next_conversation_id: i64,
    next_message_id: i64,
    clock: DateTime<Utc>,
    failures: HashMap<StoreOp, u32>,
    calls: HashMap<StoreOp, usize>,
    latency: Option<Duration>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            conversations: Vec::new(),
            messages: Vec::new(),
            next_conversation_id: 1,
            next_message_id: 1,
            clock: Utc
                .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            failures: HashMap::new(),
            calls: HashMap::new(),
            latency: None,
        }
    }
}

impl Inner {
    /// Advance the logical clock so every write gets a distinct timestamp.
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += ChronoDuration::seconds(1);
        self.clock
    }

    fn touch(&mut self, conversation_id: i64) {
        let now = self.tick();
        if let Some(conv) = self
            .conversations
            .iter_mut()
            .find(|c| c.conversation_id == conversation_id)
        {
            conv.updated_at = now;
        }
    }

    fn conversation(&self, conversation_id: i64) -> Result<&Conversation, RequestError> {
        self.conversations
            .iter()
            .find(|c| c.conversation_id == conversation_id)
            .ok_or_else(not_found)
    }
}

fn not_found() -> RequestError {
    RequestError::HttpStatus {
        status: 404,
        message: "Not Found".to_string(),
    }
}

fn injected() -> RequestError {
    RequestError::HttpStatus {
        status: 500,
        message: "Internal Server Error".to_string(),
    }
}

fn new_thread_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("thread_{}", &hex[..16])
}

/// In-memory [`ConversationStore`].
///
/// # Example
///
/// ```ignore
/// use convsync::adapters::mock::{InMemoryStore, StoreOp};
///
/// let store = InMemoryStore::new();
/// store.fail_next(StoreOp::CreateMessage, 1);
/// // The next create_message returns HTTP 500; later ones succeed.
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `count` calls of `op` fail with HTTP 500.
    pub fn fail_next(&self, op: StoreOp, count: u32) {
        self.lock().failures.insert(op, count);
    }

    /// Make every call of `op` fail until [`clear_failures`](Self::clear_failures).
    pub fn fail_always(&self, op: StoreOp) {
        self.fail_next(op, u32::MAX);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Delay every call by `latency` before it touches the data, so that
    /// concurrent callers interleave.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Number of times `op` has been called, including failed calls.
    pub fn calls(&self, op: StoreOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// All conversations, including soft-deleted ones.
    pub fn all_conversations(&self) -> Vec<Conversation> {
        self.lock().conversations.clone()
    }

    /// Messages of one conversation in creation order.
    pub fn messages_of(&self, conversation_id: i64) -> Vec<Message> {
        self.lock()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// Insert a conversation directly, bypassing counters and failures.
    pub fn seed_conversation(&self, user_id: i64, title: &str) -> Conversation {
        let mut inner = self.lock();
        create_conversation_locked(&mut inner, user_id, title)
    }

    /// Insert a message directly, bypassing counters and failures.
    pub fn seed_message(&self, conversation_id: i64, role: MessageRole, text: &str) -> Message {
        let mut inner = self.lock();
        create_message_locked(&mut inner, conversation_id, role, MessageContent::text(text))
    }

    /// Count the call, sleep for the configured latency, then consume an
    /// injected failure if one is pending.
    async fn enter(&self, op: StoreOp) -> Result<(), RequestError> {
        let latency = {
            let mut inner = self.lock();
            *inner.calls.entry(op).or_insert(0) += 1;
            inner.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut inner = self.lock();
        match inner.failures.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                tracing::debug!("InMemoryStore: injected failure for {:?}", op);
                Err(injected())
            }
            _ => Ok(()),
        }
    }
}

fn create_conversation_locked(inner: &mut Inner, user_id: i64, title: &str) -> Conversation {
    let now = inner.tick();
    let conv = Conversation {
        conversation_id: inner.next_conversation_id,
        user_id,
        title: title.to_string(),
        thread_id: new_thread_id(),
        created_at: now,
        updated_at: now,
        is_active: true,
    };
    inner.next_conversation_id += 1;
    inner.conversations.push(conv.clone());
    conv
}

fn create_message_locked(
    inner: &mut Inner,
    conversation_id: i64,
    role: MessageRole,
    content: MessageContent,
) -> Message {
    let now = inner.tick();
    let msg = Message {
        message_id: inner.next_message_id,
        conversation_id,
        role,
        content,
        created_at: now,
    };
    inner.next_message_id += 1;
    inner.messages.push(msg.clone());
    inner.touch(conversation_id);
    msg
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn create_conversation(
        &self,
        user_id: i64,
        title: &str,
    ) -> Result<Conversation, RequestError> {
        self.enter(StoreOp::CreateConversation).await?;
        let mut inner = self.lock();
        Ok(create_conversation_locked(&mut inner, user_id, title))
    }

    async fn list_conversations(
        &self,
        user_id: i64,
        include_inactive: bool,
    ) -> Result<Vec<Conversation>, RequestError> {
        self.enter(StoreOp::ListConversations).await?;
        let inner = self.lock();
        let mut list: Vec<Conversation> = inner
            .conversations
            .iter()
            .filter(|c| c.user_id == user_id && (include_inactive || c.is_active))
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(b.conversation_id.cmp(&a.conversation_id))
        });
        Ok(list)
    }

    async fn get_conversation(&self, conversation_id: i64) -> Result<Conversation, RequestError> {
        self.enter(StoreOp::GetConversation).await?;
        self.lock().conversation(conversation_id).cloned()
    }

    async fn get_conversation_by_thread(
        &self,
        thread_id: &str,
    ) -> Result<Conversation, RequestError> {
        self.enter(StoreOp::GetConversationByThread).await?;
        self.lock()
            .conversations
            .iter()
            .find(|c| c.thread_id == thread_id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn update_conversation(
        &self,
        conversation_id: i64,
        update: &ConversationUpdate,
    ) -> Result<Conversation, RequestError> {
        self.enter(StoreOp::UpdateConversation).await?;
        let mut inner = self.lock();
        let now = inner.tick();
        let conv = inner
            .conversations
            .iter_mut()
            .find(|c| c.conversation_id == conversation_id)
            .ok_or_else(not_found)?;
        if let Some(title) = &update.title {
            conv.title = title.clone();
        }
        if let Some(active) = update.is_active {
            conv.is_active = active;
        }
        conv.updated_at = now;
        Ok(conv.clone())
    }

    async fn delete_conversation(
        &self,
        conversation_id: i64,
        soft: bool,
    ) -> Result<(), RequestError> {
        self.enter(StoreOp::DeleteConversation).await?;
        let mut inner = self.lock();
        inner.conversation(conversation_id)?;
        if soft {
            let now = inner.tick();
            if let Some(conv) = inner
                .conversations
                .iter_mut()
                .find(|c| c.conversation_id == conversation_id)
            {
                conv.is_active = false;
                conv.updated_at = now;
            }
        } else {
            inner
                .conversations
                .retain(|c| c.conversation_id != conversation_id);
            inner
                .messages
                .retain(|m| m.conversation_id != conversation_id);
        }
        Ok(())
    }

    async fn create_message(
        &self,
        conversation_id: i64,
        role: MessageRole,
        content: &MessageContent,
    ) -> Result<Message, RequestError> {
        self.enter(StoreOp::CreateMessage).await?;
        let mut inner = self.lock();
        inner.conversation(conversation_id)?;
        Ok(create_message_locked(
            &mut inner,
            conversation_id,
            role,
            content.clone(),
        ))
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, RequestError> {
        self.enter(StoreOp::ListMessages).await?;
        let inner = self.lock();
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_message(&self, message_id: i64) -> Result<Message, RequestError> {
        self.enter(StoreOp::GetMessage).await?;
        self.lock()
            .messages
            .iter()
            .find(|m| m.message_id == message_id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn count_messages(&self, conversation_id: i64) -> Result<u64, RequestError> {
        self.enter(StoreOp::CountMessages).await?;
        let inner = self.lock();
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .count() as u64)
    }

    async fn delete_message(&self, message_id: i64) -> Result<(), RequestError> {
        self.enter(StoreOp::DeleteMessage).await?;
        let mut inner = self.lock();
        let conversation_id = inner
            .messages
            .iter()
            .find(|m| m.message_id == message_id)
            .map(|m| m.conversation_id)
            .ok_or_else(not_found)?;
        inner.messages.retain(|m| m.message_id != message_id);
        inner.touch(conversation_id);
        Ok(())
    }

    async fn delete_all_messages(&self, conversation_id: i64) -> Result<(), RequestError> {
        self.enter(StoreOp::DeleteAllMessages).await?;
        let mut inner = self.lock();
        inner.conversation(conversation_id)?;
        inner
            .messages
            .retain(|m| m.conversation_id != conversation_id);
        inner.touch(conversation_id);
        Ok(())
    }
}
