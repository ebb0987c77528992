//! Result type alias and context extension.

use super::context::ErrorContext;
use super::request::RequestError;
use super::sync_error::SyncError;

/// Type alias for Results using SyncError.
pub type SyncResult<T> = Result<T, SyncError>;

/// Extension trait for Result types to add context to errors.
pub trait ResultExt<T> {
    /// Add context to an error if the result is Err.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use convsync::error::{ErrorContext, ResultExt};
    ///
    /// let conv = store
    ///     .get_conversation(id)
    ///     .await
    ///     .context(ErrorContext::new("get_conversation").with_conversation_id(id))?;
    /// ```
    fn context(self, ctx: ErrorContext) -> SyncResult<T>;

    /// Add context using a closure (only called on error).
    fn with_context<F>(self, f: F) -> SyncResult<T>
    where
        F: FnOnce() -> ErrorContext;
}

impl<T> ResultExt<T> for SyncResult<T> {
    fn context(self, ctx: ErrorContext) -> SyncResult<T> {
        self.map_err(|e| e.with_context(ctx))
    }

    fn with_context<F>(self, f: F) -> SyncResult<T>
    where
        F: FnOnce() -> ErrorContext,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for Result<T, RequestError> {
    fn context(self, ctx: ErrorContext) -> SyncResult<T> {
        self.map_err(|e| SyncError::from(e).with_context(ctx))
    }

    fn with_context<F>(self, f: F) -> SyncResult<T>
    where
        F: FnOnce() -> ErrorContext,
    {
        self.map_err(|e| SyncError::from(e).with_context(f()))
    }
}
