//! Session orchestration.
//!
//! Ties the [`SessionManager`](crate::session::SessionManager) and the
//! [`PersistenceBridge`](crate::bridge::PersistenceBridge) to lifecycle
//! events: login, automatic first conversation, switching, creating and
//! deleting.

mod guard;
mod session;

pub use guard::{AutoCreateGuard, SwitchingFlag, SwitchingScope};
pub use session::SessionOrchestrator;
