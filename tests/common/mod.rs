//! Common test utilities for integration tests.
//!
//! Fixtures for store payloads and a builder that wires a full session
//! (store, stream, manager, bridge, orchestrator) around in-memory doubles.
//!
//! # Example
//!
//! ```ignore
//! let session = TestSession::builder().with_store_latency_ms(5).build();
//! session.orchestrator.handle_login(TEST_USER).await;
//! ```

#![allow(dead_code)]

pub mod mocks;

pub use mocks::*;

use std::sync::Arc;
use std::time::Duration;

use convsync::adapters::ChannelMessageStream;
use convsync::bridge::PersistenceBridge;
use convsync::config::SyncConfig;
use convsync::orchestrator::SessionOrchestrator;
use convsync::session::SessionManager;

/// User id used throughout the integration tests.
pub const TEST_USER: i64 = 42;

/// A conversation row as the store returns it.
pub fn conversation_json(id: i64, title: &str, thread_id: &str) -> serde_json::Value {
    serde_json::json!({
        "conversation_id": id,
        "user_id": TEST_USER,
        "title": title,
        "created_at": "2025-01-15T10:30:00+00:00",
        "updated_at": "2025-01-15T10:45:00+00:00",
        "thread_id": thread_id,
        "is_active": true
    })
}

/// A message row as the store returns it.
pub fn message_json(id: i64, conversation_id: i64, role: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "message_id": id,
        "conversation_id": conversation_id,
        "role": role,
        "content": {"text": text, "metadata": {}},
        "created_at": "2025-01-15T10:31:00+00:00"
    })
}

/// Config with no remount pause, so flows finish immediately.
pub fn test_config() -> SyncConfig {
    SyncConfig::default().with_remount_delay(Duration::ZERO)
}

/// A fully wired session over in-memory doubles.
pub struct TestSession {
    pub store: Arc<InMemoryStore>,
    pub stream: Arc<ChannelMessageStream>,
    pub manager: Arc<SessionManager>,
    pub bridge: Arc<PersistenceBridge>,
    pub orchestrator: SessionOrchestrator,
}

impl TestSession {
    pub fn builder() -> TestSessionBuilder {
        TestSessionBuilder::default()
    }

    /// Titles of the loaded list in display order.
    pub fn titles(&self) -> Vec<String> {
        self.manager
            .conversations()
            .into_iter()
            .map(|c| c.title)
            .collect()
    }

    /// One bridge pass over the stream as it is now.
    pub async fn pump(&self) -> convsync::bridge::PassReport {
        use convsync::traits::MessageStream;
        self.bridge.on_stream_changed(&self.stream.snapshot()).await
    }
}

/// Builder for [`TestSession`].
#[derive(Default)]
pub struct TestSessionBuilder {
    config: Option<SyncConfig>,
    latency: Option<Duration>,
    initial_context: Option<String>,
    seed: Vec<String>,
}

impl TestSessionBuilder {
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Delay every store call so concurrent flows interleave.
    pub fn with_store_latency_ms(mut self, ms: u64) -> Self {
        self.latency = Some(Duration::from_millis(ms));
        self
    }

    pub fn with_initial_context(mut self, context: &str) -> Self {
        self.initial_context = Some(context.to_string());
        self
    }

    /// Conversations owned by [`TEST_USER`], oldest first.
    pub fn with_conversations(mut self, titles: &[&str]) -> Self {
        self.seed = titles.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn build(self) -> TestSession {
        let store = Arc::new(InMemoryStore::new());
        for title in &self.seed {
            store.seed_conversation(TEST_USER, title);
        }
        if let Some(latency) = self.latency {
            store.set_latency(latency);
        }

        let stream = Arc::new(ChannelMessageStream::new());
        let manager = Arc::new(SessionManager::new(
            store.clone(),
            self.config.unwrap_or_else(test_config),
        ));

        let mut bridge = PersistenceBridge::new(store.clone(), stream.clone());
        if let Some(context) = self.initial_context {
            bridge = bridge.with_initial_context(context);
        }
        let bridge = Arc::new(bridge);

        let orchestrator = SessionOrchestrator::new(manager.clone()).with_bridge(bridge.clone());

        TestSession {
            store,
            stream,
            manager,
            bridge,
            orchestrator,
        }
    }
}
