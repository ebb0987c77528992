//! convsync - conversation session and message synchronization
//!
//! Keeps a chat client's conversation list, current conversation and
//! message history in step with a remote conversation store, and mirrors
//! the chat widget's transient message stream into that store.
//!
//! - [`store`] - typed client for the store's REST API
//! - [`session`] - conversation list, selection and messages
//! - [`bridge`] - stream-to-store persistence
//! - [`orchestrator`] - login, auto-create, switch and delete flows

pub mod adapters;
pub mod bridge;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod prelude;
pub mod session;
pub mod store;
pub mod traits;
