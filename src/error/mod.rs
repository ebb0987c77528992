//! Error handling for the conversation sync layer.
//!
//! - **Error Categories**: classification used for retry and messaging decisions
//! - **RequestError**: a single store call that did not report success
//! - **SyncError**: unified type, including the non-fatal `NotFoundLocally`
//!   and `PersistenceSkipped` outcomes
//! - **Error Context**: operation, conversation and thread attached to errors
//! - **Result Type Alias**: `SyncResult<T>`
//!
//! | Category | Source | Retryable |
//! |----------|--------|-----------|
//! | Network | connection, timeout, 408/429 | Yes |
//! | Server | 5xx, undecodable 2xx body | Yes |
//! | Client | other 4xx, invalid request | No |
//! | User | stale selection, nothing selected | No |

mod category;
mod context;
mod request;
mod result;
mod sync_error;

pub use category::ErrorCategory;
pub use context::ErrorContext;
pub use request::RequestError;
pub use result::{ResultExt, SyncResult};
pub use sync_error::SyncError;
