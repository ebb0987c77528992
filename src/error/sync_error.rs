//! Unified error type for session and synchronization operations.

use thiserror::Error;

use super::category::ErrorCategory;
use super::context::ErrorContext;
use super::request::RequestError;

/// Unified error type.
///
/// `Request` failures come from the store. `NotFoundLocally` and
/// `PersistenceSkipped` are non-fatal outcomes that are logged and recorded
/// as the session's last error rather than propagated.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The store call failed.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Selection target is absent from the in-memory conversation list.
    #[error("no loaded conversation has thread id '{thread_id}'")]
    NotFoundLocally { thread_id: String },

    /// An operation that needs a current conversation ran without one.
    #[error("no conversation is selected")]
    NoCurrentConversation,

    /// An operation that needs a user ran before login.
    #[error("no user is logged in")]
    NoUser,

    /// A stream message failed to persist and stays eligible for retry.
    #[error("stream message '{stream_message_id}' was not persisted: {reason}")]
    PersistenceSkipped {
        stream_message_id: String,
        #[source]
        reason: RequestError,
    },

    /// Wrapped error with additional context.
    #[error("{error} {context}")]
    WithContext {
        error: Box<SyncError>,
        context: ErrorContext,
    },
}

impl SyncError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::Request(err) => err.category(),
            SyncError::NotFoundLocally { .. }
            | SyncError::NoCurrentConversation
            | SyncError::NoUser => ErrorCategory::User,
            SyncError::PersistenceSkipped { reason, .. } => reason.category(),
            SyncError::WithContext { error, .. } => error.category(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            // The next observed stream change retries it regardless of cause.
            SyncError::PersistenceSkipped { .. } => true,
            SyncError::WithContext { error, .. } => error.is_retryable(),
            other => other.category().is_retryable(),
        }
    }

    /// Short status message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Request(err) => err.user_message(),
            SyncError::NotFoundLocally { .. } => {
                "That conversation is not in the current list.".to_string()
            }
            SyncError::NoCurrentConversation => "Select a conversation first.".to_string(),
            SyncError::NoUser => "Log in first.".to_string(),
            SyncError::PersistenceSkipped { .. } => {
                "A message could not be saved yet; it will be retried.".to_string()
            }
            SyncError::WithContext { error, .. } => error.user_message(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Request(err) => err.error_code(),
            SyncError::NotFoundLocally { .. } => "SYNC_NOT_FOUND_LOCALLY",
            SyncError::NoCurrentConversation => "SYNC_NO_CURRENT",
            SyncError::NoUser => "SYNC_NO_USER",
            SyncError::PersistenceSkipped { .. } => "SYNC_PERSISTENCE_SKIPPED",
            SyncError::WithContext { error, .. } => error.error_code(),
        }
    }

    /// Attach context to this error.
    pub fn with_context(self, ctx: ErrorContext) -> Self {
        SyncError::WithContext {
            error: Box::new(self),
            context: ctx,
        }
    }

    /// Get the context if this error has one attached.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            SyncError::WithContext { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Get the inner error without context.
    pub fn inner(&self) -> &SyncError {
        match self {
            SyncError::WithContext { error, .. } => error.inner(),
            _ => self,
        }
    }

    /// Get the recovery hint for this error.
    pub fn recovery_hint(&self) -> &'static str {
        self.category().recovery_hint()
    }
}
