//! Client-local session state
//!
//! SessionState holds what the UI renders: the user's conversation list,
//! the selected conversation, that conversation's messages, and loading and
//! error status. It lives only as long as the owning session.

use crate::models::{Conversation, Message};

/// Ephemeral state owned by a [`SessionManager`](super::SessionManager).
///
/// Invariants kept by the manager:
/// - `current_thread_id` equals `current_conversation.thread_id` whenever
///   a current conversation is set
/// - `messages` belong to `current_conversation`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Conversations in the order the store returned them
    pub conversations: Vec<Conversation>,

    /// The selected conversation, if any
    pub current_conversation: Option<Conversation>,

    /// Thread id of the selected conversation
    pub current_thread_id: Option<String>,

    /// Messages of the selected conversation, ascending
    pub messages: Vec<Message>,

    /// Short status message of the most recent failure
    pub last_error: Option<String>,

    /// What the user can do about the most recent failure
    pub last_error_hint: Option<&'static str>,

    /// True once a conversation list load has succeeded
    pub loaded: bool,

    /// Number of network operations in flight
    pub(crate) pending: usize,

    /// Sequence number handed to the most recently started load
    pub(crate) load_started: u64,

    /// Sequence number of the newest load whose result was applied
    pub(crate) load_applied: u64,
}

impl SessionState {
    /// Create a new empty SessionState
    pub fn new() -> Self {
        Self::default()
    }

    /// True while any load, select or refresh is in flight
    pub fn is_loading(&self) -> bool {
        self.pending > 0
    }

    pub fn current_conversation_id(&self) -> Option<i64> {
        self.current_conversation
            .as_ref()
            .map(|c| c.conversation_id)
    }

    /// Find a loaded conversation by its thread id
    pub fn find_by_thread(&self, thread_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.thread_id == thread_id)
    }

    /// Make `conversation` current and drop the previous conversation's messages
    pub fn set_current(&mut self, conversation: Conversation) {
        self.current_thread_id = Some(conversation.thread_id.clone());
        self.current_conversation = Some(conversation);
        self.messages.clear();
    }

    /// Clear the selection and its messages
    pub fn clear_current(&mut self) {
        self.current_conversation = None;
        self.current_thread_id = None;
        self.messages.clear();
    }

    /// True if `conversation_id` is the selected conversation
    pub fn is_current(&self, conversation_id: i64) -> bool {
        self.current_conversation_id() == Some(conversation_id)
    }

    /// Replace the list entry and the current copy of `conversation`.
    /// Other entries are left untouched.
    pub fn patch_conversation(&mut self, conversation: &Conversation) {
        if let Some(entry) = self
            .conversations
            .iter_mut()
            .find(|c| c.conversation_id == conversation.conversation_id)
        {
            *entry = conversation.clone();
        }
        if self.is_current(conversation.conversation_id) {
            self.current_conversation = Some(conversation.clone());
        }
    }

    /// Remove a conversation from the list, clearing the selection if it
    /// was current. Returns true if it was current.
    pub fn remove_conversation(&mut self, conversation_id: i64) -> bool {
        self.conversations
            .retain(|c| c.conversation_id != conversation_id);
        if self.is_current(conversation_id) {
            self.clear_current();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn conv(id: i64, title: &str) -> Conversation {
        Conversation {
            conversation_id: id,
            user_id: 1,
            title: title.to_string(),
            thread_id: format!("thread_{:016x}", id),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            is_active: true,
        }
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = SessionState::new();
        assert!(state.conversations.is_empty());
        assert!(state.current_conversation.is_none());
        assert!(!state.is_loading());
        assert!(!state.loaded);
    }

    #[test]
    fn test_set_current_keeps_thread_in_sync() {
        let mut state = SessionState::new();
        state.set_current(conv(1, "A"));
        assert_eq!(state.current_thread_id.as_deref(), Some("thread_0000000000000001"));
        assert!(state.is_current(1));
    }

    #[test]
    fn test_patch_updates_list_and_current_only() {
        let mut state = SessionState::new();
        state.conversations = vec![conv(1, "A"), conv(2, "B")];
        state.set_current(conv(1, "A"));

        state.patch_conversation(&conv(1, "Renamed"));

        assert_eq!(state.conversations[0].title, "Renamed");
        assert_eq!(state.conversations[1].title, "B");
        assert_eq!(state.current_conversation.as_ref().unwrap().title, "Renamed");
    }

    #[test]
    fn test_remove_current_clears_selection() {
        let mut state = SessionState::new();
        state.conversations = vec![conv(1, "A"), conv(2, "B")];
        state.set_current(conv(2, "B"));

        assert!(!state.remove_conversation(1));
        assert!(state.is_current(2));

        assert!(state.remove_conversation(2));
        assert!(state.conversations.is_empty());
        assert!(state.current_thread_id.is_none());
        assert!(state.messages.is_empty());
    }
}
