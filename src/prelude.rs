//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```ignore
//! use convsync::prelude::*;
//! ```

// Configuration
pub use crate::config::SyncConfig;

// Errors
pub use crate::error::{ErrorCategory, ErrorContext, RequestError, ResultExt, SyncError, SyncResult};

// Model types
pub use crate::models::{
    Conversation, ConversationUpdate, Message, MessageContent, MessageRole, StreamMessage,
    StreamRole,
};

// Seams
pub use crate::traits::{ConversationStore, HttpClient, MessageStream};

// Components
pub use crate::bridge::{PassReport, PersistenceBridge};
pub use crate::orchestrator::SessionOrchestrator;
pub use crate::session::{SelectOutcome, SessionManager, SessionState};
pub use crate::store::StoreClient;

// Adapters
pub use crate::adapters::{ChannelMessageStream, ReqwestHttpClient};
