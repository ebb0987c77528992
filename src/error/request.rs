//! Failures of a single call against the conversation store.

use thiserror::Error;

use super::category::ErrorCategory;
use crate::traits::{HttpError, Response};

/// A store call that did not report success.
///
/// No retries happen at the layer that produces this error; retry policy
/// belongs to the caller.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// The store answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(HttpError),

    /// A 2xx response whose body could not be decoded.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Rejected locally before any network call.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl RequestError {
    /// Build an `HttpStatus` error from a non-2xx response, carrying the
    /// status reason phrase.
    pub fn from_response(response: &Response) -> Self {
        let message = reqwest::StatusCode::from_u16(response.status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown status")
            .to_string();
        RequestError::HttpStatus {
            status: response.status,
            message,
        }
    }

    /// HTTP status, if the store answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RequestError::HttpStatus { status, .. } if *status >= 500 => ErrorCategory::Server,
            RequestError::HttpStatus { status: 408, .. }
            | RequestError::HttpStatus { status: 429, .. } => ErrorCategory::Network,
            RequestError::HttpStatus { .. } => ErrorCategory::Client,
            RequestError::Transport(HttpError::InvalidUrl(_)) => ErrorCategory::Client,
            RequestError::Transport(_) => ErrorCategory::Network,
            RequestError::InvalidResponse { .. } => ErrorCategory::Server,
            RequestError::InvalidRequest { .. } => ErrorCategory::Client,
        }
    }

    /// Check if a later attempt of the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Get a short user-facing message.
    pub fn user_message(&self) -> String {
        match self {
            RequestError::HttpStatus { status, message } => match *status {
                400 => "The request was invalid.".to_string(),
                404 => "The conversation no longer exists.".to_string(),
                500..=599 => format!("The server is having trouble ({} {}).", status, message),
                _ => format!("The server returned an error ({} {}).", status, message),
            },
            RequestError::Transport(HttpError::Timeout(_)) => {
                "The server took too long to respond.".to_string()
            }
            RequestError::Transport(_) => "Unable to reach the server.".to_string(),
            RequestError::InvalidResponse { .. } => {
                "Received an unexpected response from the server.".to_string()
            }
            RequestError::InvalidRequest { message } => format!("Nothing was sent: {}.", message),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::HttpStatus { .. } => "REQ_HTTP_STATUS",
            RequestError::Transport(_) => "REQ_TRANSPORT",
            RequestError::InvalidResponse { .. } => "REQ_INVALID_RESPONSE",
            RequestError::InvalidRequest { .. } => "REQ_INVALID_REQUEST",
        }
    }
}

impl From<HttpError> for RequestError {
    fn from(err: HttpError) -> Self {
        RequestError::Transport(err)
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        RequestError::InvalidResponse {
            message: err.to_string(),
        }
    }
}
