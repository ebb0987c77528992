//! Message persistence bridge.
//!
//! The chat widget keeps its messages in memory only. The bridge watches
//! that stream and writes each newly appended message to the store once,
//! skipping whatever was already on screen when a conversation was
//! activated.

mod persistence;
mod tracker;

pub use persistence::{
    store_role, stored_content, PassReport, PersistenceBridge, CAPTURE_TIMESTAMP_KEY,
    STREAM_MESSAGE_ID_KEY,
};
pub use tracker::PersistenceTracker;
