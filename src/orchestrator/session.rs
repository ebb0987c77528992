//! Lifecycle coordination on top of the session manager and bridge.

use std::sync::{Arc, Mutex};

use crate::bridge::PersistenceBridge;
use crate::error::{SyncError, SyncResult};
use crate::models::Conversation;
use crate::session::{SelectOutcome, SessionManager};

use super::guard::{AutoCreateGuard, SwitchingFlag};

/// Drives the session through login, switching, creation and deletion.
///
/// Compound flows (create, reload, select) run strictly in sequence within
/// one call. The auto-create latch is the only mutual exclusion between
/// calls; it is set before the first await of the create it guards.
pub struct SessionOrchestrator {
    manager: Arc<SessionManager>,
    bridge: Option<Arc<PersistenceBridge>>,
    user_id: Mutex<Option<i64>>,
    auto_create: AutoCreateGuard,
    fallback_create: AutoCreateGuard,
    switching: SwitchingFlag,
}

impl SessionOrchestrator {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self {
            manager,
            bridge: None,
            user_id: Mutex::new(None),
            auto_create: AutoCreateGuard::new(),
            fallback_create: AutoCreateGuard::new(),
            switching: SwitchingFlag::default(),
        }
    }

    /// Keep `bridge` pointed at the current conversation.
    pub fn with_bridge(mut self, bridge: Arc<PersistenceBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    pub fn bridge(&self) -> Option<&Arc<PersistenceBridge>> {
        self.bridge.as_ref()
    }

    pub fn user_id(&self) -> Option<i64> {
        *self
            .user_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn require_user(&self) -> SyncResult<i64> {
        self.user_id().ok_or(SyncError::NoUser)
    }

    /// True while a switch or create-and-select is in progress.
    pub fn is_switching(&self) -> bool {
        self.switching.is_set()
    }

    /// True once an automatic first conversation has been created (or is
    /// being created).
    pub fn auto_create_latched(&self) -> bool {
        self.auto_create.is_set()
    }

    fn sync_bridge(&self) {
        if let Some(bridge) = &self.bridge {
            let current = self.manager.current_conversation();
            bridge.activate(
                current.as_ref(),
                self.manager.config().persistence_enabled,
            );
        }
    }

    async fn select(&self, thread_id: &str) -> SelectOutcome {
        let outcome = self.manager.select_conversation(thread_id).await;
        self.sync_bridge();
        outcome
    }

    async fn remount_pause(&self) {
        let delay = self.manager.config().remount_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// The user's identity became available.
    ///
    /// Loads their conversations. An empty list leads to the automatic
    /// first conversation; otherwise, with nothing selected, the most
    /// recently updated conversation is selected.
    pub async fn handle_login(&self, user_id: i64) -> Vec<Conversation> {
        *self
            .user_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(user_id);
        tracing::info!("User {} logged in", user_id);

        let conversations = self.manager.load_conversations(user_id).await;
        if !self.manager.is_loaded() {
            return conversations;
        }

        if conversations.is_empty() {
            self.auto_create_if_empty().await;
        } else if self.manager.current_thread_id().is_none() {
            if let Some(first) = conversations.first() {
                self.select(&first.thread_id).await;
            }
        }
        self.manager.conversations()
    }

    /// Create the user's first conversation if the loaded list is empty and
    /// nothing is selected.
    ///
    /// Runs at most once per orchestrator: the latch stays set after a
    /// success and is cleared only on failure, so a later call may retry.
    pub async fn auto_create_if_empty(&self) -> Option<Conversation> {
        let user_id = self.user_id()?;
        if !self.manager.is_loaded()
            || !self.manager.conversations().is_empty()
            || self.manager.current_thread_id().is_some()
        {
            return None;
        }
        if !self.auto_create.try_acquire() {
            tracing::debug!("Auto-create already latched for user {}", user_id);
            return None;
        }

        tracing::info!("No conversations for user {}; creating the first one", user_id);
        let title = self.manager.config().default_title.clone();
        match self.manager.create_conversation(user_id, &title).await {
            Ok(conversation) => {
                self.manager.load_conversations(user_id).await;
                self.select(&conversation.thread_id).await;
                Some(conversation)
            }
            Err(err) => {
                tracing::warn!("Auto-create failed, latch cleared for retry: {}", err);
                self.auto_create.release();
                None
            }
        }
    }

    /// Switch to another loaded conversation.
    pub async fn switch_conversation(&self, thread_id: &str) -> SelectOutcome {
        let _switching = self.switching.enter();
        self.select(thread_id).await
    }

    /// Create a conversation, reload the list, select it, then give the
    /// widget time to remount.
    pub async fn create_new_conversation(&self, title: &str) -> SyncResult<Conversation> {
        let user_id = self.require_user()?;
        let _switching = self.switching.enter();

        let conversation = self.manager.create_conversation(user_id, title).await?;
        self.manager.load_conversations(user_id).await;
        if let SelectOutcome::NotFoundLocally = self.select(&conversation.thread_id).await {
            tracing::warn!(
                "Created conversation {} missing from reloaded list",
                conversation.conversation_id
            );
        }
        self.remount_pause().await;
        Ok(conversation)
    }

    /// Rename a conversation.
    pub async fn rename_conversation(
        &self,
        conversation_id: i64,
        title: &str,
    ) -> SyncResult<Conversation> {
        self.manager
            .update_conversation_title(conversation_id, title)
            .await
    }

    /// Delete a conversation, then keep something selected: the most
    /// recently updated remaining conversation, or a new one if none remain.
    ///
    /// Returns false if the store refused the delete.
    pub async fn delete_conversation(&self, conversation_id: i64) -> bool {
        let was_current = self
            .manager
            .current_conversation()
            .is_some_and(|c| c.conversation_id == conversation_id);

        if !self.manager.delete_conversation(conversation_id).await {
            return false;
        }
        self.sync_bridge();

        let remaining = self.manager.conversations();
        match remaining.first() {
            Some(next) if was_current => {
                let _switching = self.switching.enter();
                self.select(&next.thread_id).await;
            }
            None if self.manager.current_thread_id().is_none() => {
                self.create_fallback().await;
            }
            _ => {}
        }
        true
    }

    /// The create-first path after the last conversation was deleted.
    ///
    /// Independent of the permanent auto-create latch; concurrent deletes
    /// share one in-progress flag so only one of them creates.
    async fn create_fallback(&self) -> Option<Conversation> {
        let user_id = self.user_id()?;
        if !self.fallback_create.try_acquire() {
            tracing::debug!("Fallback create already in progress");
            return None;
        }

        let _switching = self.switching.enter();
        let title = self.manager.config().default_title.clone();
        let created = match self.manager.create_conversation(user_id, &title).await {
            Ok(conversation) => {
                self.manager.load_conversations(user_id).await;
                self.select(&conversation.thread_id).await;
                Some(conversation)
            }
            Err(err) => {
                tracing::warn!("Could not create a replacement conversation: {}", err);
                None
            }
        };
        self.fallback_create.release();
        created
    }

    /// Tear the session down: late responses are dropped and the bridge
    /// stops persisting.
    pub fn shutdown(&self) {
        self.manager.close();
        if let Some(bridge) = &self.bridge {
            bridge.deactivate();
        }
    }
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("user_id", &self.user_id())
            .field("auto_create", &self.auto_create)
            .field("switching", &self.is_switching())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{InMemoryStore, StoreOp};
    use crate::adapters::ChannelMessageStream;
    use crate::config::SyncConfig;
    use std::time::Duration;

    fn setup() -> (Arc<InMemoryStore>, SessionOrchestrator) {
        let store = Arc::new(InMemoryStore::new());
        let config = SyncConfig::default().with_remount_delay(Duration::ZERO);
        let manager = Arc::new(SessionManager::new(store.clone(), config));
        (store, SessionOrchestrator::new(manager))
    }

    #[tokio::test]
    async fn test_login_with_conversations_selects_most_recent() {
        let (store, orchestrator) = setup();
        store.seed_conversation(7, "Old");
        let newest = store.seed_conversation(7, "New");

        let list = orchestrator.handle_login(7).await;

        assert_eq!(list.len(), 2);
        assert_eq!(orchestrator.manager().current_thread_id(), Some(newest.thread_id));
        assert_eq!(store.calls(StoreOp::CreateConversation), 0);
        assert!(!orchestrator.auto_create_latched());
    }

    #[tokio::test]
    async fn test_login_empty_auto_creates_and_selects() {
        let (store, orchestrator) = setup();

        let list = orchestrator.handle_login(7).await;

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "New Conversation");
        assert_eq!(
            orchestrator.manager().current_thread_id(),
            Some(list[0].thread_id.clone())
        );
        assert_eq!(store.calls(StoreOp::CreateConversation), 1);
        assert!(orchestrator.auto_create_latched());
    }

    #[tokio::test]
    async fn test_auto_create_failure_clears_latch_for_retry() {
        let (store, orchestrator) = setup();
        store.fail_next(StoreOp::CreateConversation, 1);

        orchestrator.handle_login(7).await;
        assert!(!orchestrator.auto_create_latched());
        assert!(orchestrator.manager().current_thread_id().is_none());

        let created = orchestrator.auto_create_if_empty().await;
        assert!(created.is_some());
        assert!(orchestrator.auto_create_latched());
        assert_eq!(store.calls(StoreOp::CreateConversation), 2);
    }

    #[tokio::test]
    async fn test_auto_create_skipped_when_load_failed() {
        let (store, orchestrator) = setup();
        store.fail_next(StoreOp::ListConversations, 1);

        orchestrator.handle_login(7).await;

        assert_eq!(store.calls(StoreOp::CreateConversation), 0);
        assert!(orchestrator.manager().last_error().is_some());
    }

    #[tokio::test]
    async fn test_create_new_requires_login() {
        let (_store, orchestrator) = setup();
        let err = orchestrator.create_new_conversation("x").await.unwrap_err();
        assert!(matches!(err, SyncError::NoUser));
    }

    #[tokio::test]
    async fn test_create_new_reloads_then_selects() {
        let (store, orchestrator) = setup();
        store.seed_conversation(7, "Existing");
        orchestrator.handle_login(7).await;

        let created = orchestrator.create_new_conversation("Benefits").await.unwrap();

        let ids: Vec<i64> = orchestrator
            .manager()
            .conversations()
            .iter()
            .map(|c| c.conversation_id)
            .filter(|id| *id == created.conversation_id)
            .collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(
            orchestrator.manager().current_thread_id(),
            Some(created.thread_id)
        );
        assert!(!orchestrator.is_switching());
    }

    #[tokio::test]
    async fn test_switching_flag_visible_during_create() {
        let store = Arc::new(InMemoryStore::new());
        let config = SyncConfig::default().with_remount_delay(Duration::from_millis(50));
        let manager = Arc::new(SessionManager::new(store.clone(), config));
        let orchestrator = SessionOrchestrator::new(manager);
        store.seed_conversation(7, "Existing");
        orchestrator.handle_login(7).await;

        let (created, observed) = tokio::join!(
            orchestrator.create_new_conversation("Next"),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                orchestrator.is_switching()
            }
        );

        assert!(created.is_ok());
        assert!(observed);
        assert!(!orchestrator.is_switching());
    }

    #[tokio::test]
    async fn test_delete_non_current_keeps_selection() {
        let (store, orchestrator) = setup();
        let other = store.seed_conversation(7, "Other");
        let current = store.seed_conversation(7, "Current");
        orchestrator.handle_login(7).await;

        assert!(orchestrator.delete_conversation(other.conversation_id).await);

        assert_eq!(
            orchestrator.manager().current_thread_id(),
            Some(current.thread_id)
        );
    }

    #[tokio::test]
    async fn test_bridge_follows_selection() {
        let store = Arc::new(InMemoryStore::new());
        let stream = Arc::new(ChannelMessageStream::new());
        let manager = Arc::new(SessionManager::new(
            store.clone(),
            SyncConfig::default().with_remount_delay(Duration::ZERO),
        ));
        let bridge = Arc::new(PersistenceBridge::new(store.clone(), stream.clone()));
        let orchestrator = SessionOrchestrator::new(manager).with_bridge(bridge.clone());
        let a = store.seed_conversation(7, "A");
        let b = store.seed_conversation(7, "B");

        orchestrator.handle_login(7).await;
        assert_eq!(bridge.conversation_id(), Some(b.conversation_id));
        assert!(bridge.is_enabled());

        orchestrator.switch_conversation(&a.thread_id).await;
        assert_eq!(bridge.conversation_id(), Some(a.conversation_id));

        orchestrator.shutdown();
        assert_eq!(bridge.conversation_id(), None);
        assert!(orchestrator.manager().is_closed());
    }
}
