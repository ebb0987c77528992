//! Conversation session management.
//!
//! - [`SessionState`] - the client-local view: list, selection, messages, status
//! - [`SessionManager`] - load, create, select, rename and delete against the store

mod manager;
mod state;

pub use manager::{SelectOutcome, SessionManager};
pub use state::SessionState;
