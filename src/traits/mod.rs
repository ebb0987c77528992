//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - HTTP verbs used by the store client
//! - [`ConversationStore`] - the remote conversation/message service
//! - [`MessageStream`] - the chat widget's transient message list

pub mod http;
pub mod store;
pub mod stream;

pub use http::{Headers, HttpClient, HttpError, Response};
pub use store::ConversationStore;
pub use stream::MessageStream;
