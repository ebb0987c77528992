//! Conversation session manager.
//!
//! Owns the [`SessionState`] and performs every store call that mutates it.
//! State sits behind a `std::sync::Mutex` that is never held across an
//! await, so independent operations interleave only at network calls.

use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::SyncConfig;
use crate::error::{ErrorContext, RequestError, ResultExt, SyncError, SyncResult};
use crate::models::{Conversation, ConversationUpdate, Message, MessageContent, MessageRole};
use crate::traits::ConversationStore;

use super::state::SessionState;

/// Outcome of [`SessionManager::select_conversation`].
#[derive(Debug, Clone, PartialEq)]
pub enum SelectOutcome {
    /// The conversation is now current. Its messages were fetched, or
    /// cleared with the failure recorded as the last error.
    Selected(Conversation),
    /// No loaded conversation has this thread id; state is unchanged.
    NotFoundLocally,
}

impl SelectOutcome {
    pub fn is_selected(&self) -> bool {
        matches!(self, SelectOutcome::Selected(_))
    }
}

/// Decrements the pending-operation counter when dropped.
struct Pending<'a> {
    manager: &'a SessionManager,
}

impl<'a> Pending<'a> {
    fn start(manager: &'a SessionManager) -> Self {
        manager.state().pending += 1;
        Self { manager }
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        let mut state = self.manager.state();
        state.pending = state.pending.saturating_sub(1);
    }
}

/// Tracks the user's conversations and the selected conversation.
///
/// List, select, refresh, delete and add-message failures are recorded as
/// the last error and leave prior state intact. Create and rename also
/// return the failure, because their callers decide whether to continue.
pub struct SessionManager {
    store: Arc<dyn ConversationStore>,
    config: SyncConfig,
    state: Mutex<SessionState>,
    closed: AtomicBool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn ConversationStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            state: Mutex::new(SessionState::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Tear the session down. Responses that arrive afterwards are dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        tracing::debug!("Session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// True (and logged) when a response must be dropped because the
    /// session was closed while it was in flight.
    fn discard_after_close(&self, operation: &str) -> bool {
        if self.is_closed() {
            tracing::debug!("Discarding {} response: session closed", operation);
            true
        } else {
            false
        }
    }

    fn record_error(&self, err: &SyncError) {
        tracing::warn!("[{}] {}", err.error_code(), err);
        let mut state = self.state();
        state.last_error = Some(err.user_message());
        state.last_error_hint = Some(err.recovery_hint());
    }

    // ---- Accessors ----

    /// Copy of the whole state.
    pub fn snapshot(&self) -> SessionState {
        self.state().clone()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state().conversations.clone()
    }

    pub fn current_conversation(&self) -> Option<Conversation> {
        self.state().current_conversation.clone()
    }

    pub fn current_thread_id(&self) -> Option<String> {
        self.state().current_thread_id.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    pub fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    /// Recovery hint matching [`Self::last_error`].
    pub fn last_error_hint(&self) -> Option<&'static str> {
        self.state().last_error_hint
    }

    pub fn clear_error(&self) {
        let mut state = self.state();
        state.last_error = None;
        state.last_error_hint = None;
    }

    // ---- Operations ----

    /// Fetch and replace the user's conversation list.
    ///
    /// Returns the list this call fetched, never a cached one. A result is
    /// not applied if a load started later has already been applied. On
    /// failure the previous list is kept and an empty list is returned.
    pub async fn load_conversations(&self, user_id: i64) -> Vec<Conversation> {
        let _pending = Pending::start(self);
        let seq = {
            let mut state = self.state();
            state.load_started += 1;
            state.load_started
        };

        let result = self
            .store
            .list_conversations(user_id, self.config.include_inactive)
            .await
            .context(ErrorContext::new("load_conversations"));

        if self.discard_after_close("load_conversations") {
            return result.unwrap_or_default();
        }

        match result {
            Ok(conversations) => {
                let mut state = self.state();
                if seq > state.load_applied {
                    state.load_applied = seq;
                    state.conversations = conversations.clone();
                    state.loaded = true;
                    state.last_error = None;
                    state.last_error_hint = None;
                    tracing::info!(
                        "Loaded {} conversations for user {}",
                        conversations.len(),
                        user_id
                    );
                } else {
                    tracing::debug!("Load #{} finished after a newer load; not applied", seq);
                }
                conversations
            }
            Err(err) => {
                self.record_error(&err);
                Vec::new()
            }
        }
    }

    /// Create a conversation in the store. The local list is not touched;
    /// callers reload or merge.
    pub async fn create_conversation(&self, user_id: i64, title: &str) -> SyncResult<Conversation> {
        let title = if title.trim().is_empty() {
            self.config.default_title.as_str()
        } else {
            title
        };

        match self
            .store
            .create_conversation(user_id, title)
            .await
            .context(ErrorContext::new("create_conversation"))
        {
            Ok(conversation) => Ok(conversation),
            Err(err) => {
                if !self.is_closed() {
                    self.record_error(&err);
                }
                Err(err)
            }
        }
    }

    /// Select a loaded conversation by thread id and fetch its messages.
    ///
    /// Only the in-memory list is searched; an absent thread never triggers
    /// a reload.
    pub async fn select_conversation(&self, thread_id: &str) -> SelectOutcome {
        let conversation = {
            let mut state = self.state();
            let found = state.find_by_thread(thread_id).cloned();
            let Some(conversation) = found else {
                drop(state);
                let err = SyncError::NotFoundLocally {
                    thread_id: thread_id.to_string(),
                };
                tracing::warn!("[{}] {}", err.error_code(), err);
                return SelectOutcome::NotFoundLocally;
            };
            state.set_current(conversation.clone());
            conversation
        };
        tracing::info!(
            "Selected conversation {} ({})",
            conversation.conversation_id,
            thread_id
        );

        self.fetch_messages(&conversation, "select_conversation")
            .await;
        SelectOutcome::Selected(conversation)
    }

    /// Re-fetch messages of the current conversation. No-op without one.
    pub async fn refresh_messages(&self) {
        let Some(conversation) = self.current_conversation() else {
            tracing::debug!("refresh_messages: no conversation selected");
            return;
        };
        self.fetch_messages(&conversation, "refresh_messages").await;
    }

    /// Page through a conversation's messages until a short page comes back.
    async fn fetch_all_messages(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<Message>, RequestError> {
        let limit = self.config.message_page_limit.max(1);
        let mut messages = Vec::new();
        let mut offset = 0u32;
        loop {
            let page = self
                .store
                .list_messages(conversation_id, limit, offset)
                .await?;
            let full = page.len() >= limit as usize;
            messages.extend(page);
            if !full {
                return Ok(messages);
            }
            offset = offset.saturating_add(limit);
            tracing::debug!(
                "Conversation {} has more than {} messages; fetching next page",
                conversation_id,
                offset
            );
        }
    }

    async fn fetch_messages(&self, conversation: &Conversation, operation: &str) {
        let _pending = Pending::start(self);
        let id = conversation.conversation_id;

        let result = self
            .fetch_all_messages(id)
            .await
            .with_context(|| {
                ErrorContext::new(operation)
                    .with_conversation_id(id)
                    .with_thread_id(&conversation.thread_id)
            });

        if self.discard_after_close(operation) {
            return;
        }

        match result {
            Ok(messages) => {
                let mut state = self.state();
                if state.is_current(id) {
                    tracing::debug!("Fetched {} messages for conversation {}", messages.len(), id);
                    state.messages = messages;
                } else {
                    tracing::debug!("Conversation {} no longer current; dropping messages", id);
                }
            }
            // Messages were cleared when the conversation was selected;
            // a failed refresh keeps what is there.
            Err(err) => self.record_error(&err),
        }
    }

    /// Delete a conversation and drop it from the local list.
    ///
    /// Uses soft delete unless configured otherwise. Returns false, with
    /// the failure recorded, if the store refused.
    pub async fn delete_conversation(&self, conversation_id: i64) -> bool {
        let result = self
            .store
            .delete_conversation(conversation_id, self.config.soft_delete)
            .await
            .context(ErrorContext::new("delete_conversation").with_conversation_id(conversation_id));

        if self.discard_after_close("delete_conversation") {
            return result.is_ok();
        }

        match result {
            Ok(()) => {
                let was_current = self.state().remove_conversation(conversation_id);
                tracing::info!(
                    "Deleted conversation {} (soft={}, was_current={})",
                    conversation_id,
                    self.config.soft_delete,
                    was_current
                );
                true
            }
            Err(err) => {
                self.record_error(&err);
                false
            }
        }
    }

    /// Rename a conversation. Both the list entry and the current copy
    /// reflect the store's answer.
    pub async fn update_conversation_title(
        &self,
        conversation_id: i64,
        title: &str,
    ) -> SyncResult<Conversation> {
        let result = self
            .store
            .update_conversation(conversation_id, &ConversationUpdate::title(title))
            .await
            .context(
                ErrorContext::new("update_conversation_title").with_conversation_id(conversation_id),
            );

        if self.discard_after_close("update_conversation_title") {
            return result;
        }

        match result {
            Ok(conversation) => {
                self.state().patch_conversation(&conversation);
                tracing::info!("Renamed conversation {} to {:?}", conversation_id, title);
                Ok(conversation)
            }
            Err(err) => {
                self.record_error(&err);
                Err(err)
            }
        }
    }

    /// Persist a message in the current conversation and append it locally.
    ///
    /// Returns `None` without a current conversation or when the store call
    /// fails.
    pub async fn add_message(
        &self,
        role: MessageRole,
        text: &str,
        metadata: Map<String, Value>,
    ) -> Option<Message> {
        let Some(conversation_id) = self.state().current_conversation_id() else {
            self.record_error(&SyncError::NoCurrentConversation);
            return None;
        };

        let content = MessageContent::with_metadata(text, metadata);
        let result = self
            .store
            .create_message(conversation_id, role, &content)
            .await
            .context(ErrorContext::new("add_message").with_conversation_id(conversation_id));

        if self.discard_after_close("add_message") {
            return result.ok();
        }

        match result {
            Ok(message) => {
                let mut state = self.state();
                if state.is_current(conversation_id) {
                    state.messages.push(message.clone());
                }
                Some(message)
            }
            Err(err) => {
                self.record_error(&err);
                None
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("state", &*self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{InMemoryStore, StoreOp};
    use crate::error::ErrorCategory;

    fn setup() -> (Arc<InMemoryStore>, SessionManager) {
        let store = Arc::new(InMemoryStore::new());
        let manager = SessionManager::new(store.clone(), SyncConfig::default());
        (store, manager)
    }

    #[tokio::test]
    async fn test_load_returns_fresh_list_and_stores_it() {
        let (store, manager) = setup();
        store.seed_conversation(1, "A");
        store.seed_conversation(1, "B");

        let loaded = manager.load_conversations(1).await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded, manager.conversations());
        assert!(manager.is_loaded());
        assert!(!manager.is_loading());
    }

    #[tokio::test]
    async fn test_load_failure_keeps_previous_list() {
        let (store, manager) = setup();
        store.seed_conversation(1, "A");
        manager.load_conversations(1).await;

        store.fail_next(StoreOp::ListConversations, 1);
        let loaded = manager.load_conversations(1).await;

        assert!(loaded.is_empty());
        assert_eq!(manager.conversations().len(), 1);
        assert!(manager.last_error().is_some());
    }

    #[tokio::test]
    async fn test_error_hint_follows_category_and_clears_on_success() {
        let (store, manager) = setup();
        store.fail_next(StoreOp::ListConversations, 1);

        manager.load_conversations(1).await;
        assert_eq!(
            manager.last_error_hint(),
            Some(ErrorCategory::Server.recovery_hint())
        );

        manager.add_message(MessageRole::User, "hi", Map::new()).await;
        assert_eq!(
            manager.last_error_hint(),
            Some(ErrorCategory::User.recovery_hint())
        );

        manager.load_conversations(1).await;
        assert!(manager.last_error().is_none());
        assert!(manager.last_error_hint().is_none());
    }

    #[tokio::test]
    async fn test_create_does_not_touch_list() {
        let (_store, manager) = setup();
        let conv = manager.create_conversation(1, "Fresh").await.unwrap();
        assert_eq!(conv.title, "Fresh");
        assert!(manager.conversations().is_empty());
    }

    #[tokio::test]
    async fn test_create_blank_title_uses_default() {
        let (_store, manager) = setup();
        let conv = manager.create_conversation(1, "  ").await.unwrap();
        assert_eq!(conv.title, "New Conversation");
    }

    #[tokio::test]
    async fn test_create_failure_is_returned_and_recorded() {
        let (store, manager) = setup();
        store.fail_next(StoreOp::CreateConversation, 1);

        let err = manager.create_conversation(1, "x").await.unwrap_err();
        assert_eq!(err.inner().error_code(), "REQ_HTTP_STATUS");
        assert!(manager.last_error().is_some());
    }

    #[tokio::test]
    async fn test_select_fetches_messages() {
        let (store, manager) = setup();
        let conv = store.seed_conversation(1, "A");
        store.seed_message(conv.conversation_id, MessageRole::User, "hello");
        store.seed_message(conv.conversation_id, MessageRole::Assistant, "hi");
        manager.load_conversations(1).await;

        let outcome = manager.select_conversation(&conv.thread_id).await;

        assert!(outcome.is_selected());
        assert_eq!(manager.current_thread_id(), Some(conv.thread_id.clone()));
        let texts: Vec<String> = manager.messages().iter().map(|m| m.text().to_string()).collect();
        assert_eq!(texts, vec!["hello", "hi"]);
    }

    #[tokio::test]
    async fn test_select_unknown_thread_is_noop() {
        let (store, manager) = setup();
        let conv = store.seed_conversation(1, "A");
        manager.load_conversations(1).await;
        manager.select_conversation(&conv.thread_id).await;

        // Exists in the store but not in the loaded list.
        let late = store.seed_conversation(1, "Late");
        let outcome = manager.select_conversation(&late.thread_id).await;

        assert_eq!(outcome, SelectOutcome::NotFoundLocally);
        assert_eq!(manager.current_thread_id(), Some(conv.thread_id));
        assert_eq!(store.calls(StoreOp::ListConversations), 1);
    }

    #[tokio::test]
    async fn test_select_with_failed_fetch_clears_messages() {
        let (store, manager) = setup();
        let a = store.seed_conversation(1, "A");
        let b = store.seed_conversation(1, "B");
        store.seed_message(a.conversation_id, MessageRole::User, "in A");
        manager.load_conversations(1).await;
        manager.select_conversation(&a.thread_id).await;

        store.fail_next(StoreOp::ListMessages, 1);
        let outcome = manager.select_conversation(&b.thread_id).await;

        assert!(outcome.is_selected());
        assert!(manager.messages().is_empty());
        assert!(manager.last_error().is_some());
    }

    #[tokio::test]
    async fn test_select_fetches_every_page() {
        let store = Arc::new(InMemoryStore::new());
        let config = SyncConfig::default().with_message_page_limit(10);
        let manager = SessionManager::new(store.clone(), config);
        let conv = store.seed_conversation(1, "Long");
        for i in 0..25 {
            store.seed_message(conv.conversation_id, MessageRole::User, &format!("m{}", i));
        }
        manager.load_conversations(1).await;

        manager.select_conversation(&conv.thread_id).await;

        let messages = manager.messages();
        assert_eq!(messages.len(), 25);
        assert_eq!(messages[0].text(), "m0");
        assert_eq!(messages[24].text(), "m24");
        assert_eq!(store.calls(StoreOp::ListMessages), 3);
        assert!(manager.last_error().is_none());
    }

    #[tokio::test]
    async fn test_select_default_limit_loads_beyond_first_page() {
        let (store, manager) = setup();
        let conv = store.seed_conversation(1, "Long");
        for i in 0..105 {
            store.seed_message(conv.conversation_id, MessageRole::User, &format!("m{}", i));
        }
        manager.load_conversations(1).await;

        manager.select_conversation(&conv.thread_id).await;

        let messages = manager.messages();
        assert_eq!(messages.len(), 105);
        assert_eq!(messages.last().map(|m| m.text()), Some("m104"));
    }

    #[tokio::test]
    async fn test_exact_page_multiple_ends_on_empty_page() {
        let store = Arc::new(InMemoryStore::new());
        let config = SyncConfig::default().with_message_page_limit(5);
        let manager = SessionManager::new(store.clone(), config);
        let conv = store.seed_conversation(1, "Even");
        for i in 0..10 {
            store.seed_message(conv.conversation_id, MessageRole::User, &format!("m{}", i));
        }
        manager.load_conversations(1).await;

        manager.select_conversation(&conv.thread_id).await;

        assert_eq!(manager.messages().len(), 10);
        assert_eq!(store.calls(StoreOp::ListMessages), 3);
    }

    #[tokio::test]
    async fn test_refresh_without_current_is_noop() {
        let (store, manager) = setup();
        manager.refresh_messages().await;
        assert_eq!(store.calls(StoreOp::ListMessages), 0);
    }

    #[tokio::test]
    async fn test_refresh_picks_up_new_messages_and_keeps_them_on_failure() {
        let (store, manager) = setup();
        let conv = store.seed_conversation(1, "A");
        manager.load_conversations(1).await;
        manager.select_conversation(&conv.thread_id).await;
        assert!(manager.messages().is_empty());

        store.seed_message(conv.conversation_id, MessageRole::User, "later");
        manager.refresh_messages().await;
        assert_eq!(manager.messages().len(), 1);

        store.fail_next(StoreOp::ListMessages, 1);
        manager.refresh_messages().await;
        assert_eq!(manager.messages().len(), 1);
        assert!(manager.last_error().is_some());
    }

    #[tokio::test]
    async fn test_delete_current_clears_selection() {
        let (store, manager) = setup();
        let a = store.seed_conversation(1, "A");
        let b = store.seed_conversation(1, "B");
        manager.load_conversations(1).await;
        manager.select_conversation(&a.thread_id).await;

        assert!(manager.delete_conversation(a.conversation_id).await);

        let ids: Vec<i64> = manager.conversations().iter().map(|c| c.conversation_id).collect();
        assert_eq!(ids, vec![b.conversation_id]);
        assert!(manager.current_conversation().is_none());
        assert!(manager.current_thread_id().is_none());
        // Soft delete by default.
        assert!(!store.all_conversations()[0].is_active);
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_list() {
        let (store, manager) = setup();
        let a = store.seed_conversation(1, "A");
        manager.load_conversations(1).await;
        store.fail_next(StoreOp::DeleteConversation, 1);

        assert!(!manager.delete_conversation(a.conversation_id).await);
        assert_eq!(manager.conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_rename_patches_list_and_current() {
        let (store, manager) = setup();
        let a = store.seed_conversation(1, "A");
        let b = store.seed_conversation(1, "B");
        manager.load_conversations(1).await;
        manager.select_conversation(&a.thread_id).await;

        manager
            .update_conversation_title(a.conversation_id, "X")
            .await
            .unwrap();

        let list = manager.conversations();
        let entry = list.iter().find(|c| c.conversation_id == a.conversation_id).unwrap();
        let other = list.iter().find(|c| c.conversation_id == b.conversation_id).unwrap();
        assert_eq!(entry.title, "X");
        assert_eq!(other.title, "B");
        assert_eq!(manager.current_conversation().unwrap().title, "X");
    }

    #[tokio::test]
    async fn test_add_message_requires_current() {
        let (store, manager) = setup();
        let result = manager.add_message(MessageRole::User, "hi", Map::new()).await;
        assert!(result.is_none());
        assert_eq!(store.calls(StoreOp::CreateMessage), 0);
        assert_eq!(
            manager.last_error().as_deref(),
            Some("Select a conversation first.")
        );
    }

    #[tokio::test]
    async fn test_add_message_appends_in_call_order() {
        let (store, manager) = setup();
        let a = store.seed_conversation(1, "A");
        manager.load_conversations(1).await;
        manager.select_conversation(&a.thread_id).await;

        manager.add_message(MessageRole::User, "one", Map::new()).await.unwrap();
        manager.add_message(MessageRole::Assistant, "two", Map::new()).await.unwrap();

        let texts: Vec<String> = manager.messages().iter().map(|m| m.text().to_string()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(store.messages_of(a.conversation_id).len(), 2);
    }

    #[tokio::test]
    async fn test_responses_after_close_are_discarded() {
        let (store, manager) = setup();
        store.seed_conversation(1, "A");
        manager.close();

        let loaded = manager.load_conversations(1).await;
        assert_eq!(loaded.len(), 1);
        assert!(manager.conversations().is_empty());
        assert!(manager.last_error().is_none());
    }
}
