//! Mock HTTP client for testing.
//!
//! Returns scripted responses keyed by method and URL and records every
//! request it sees.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::traits::{Headers, HttpClient, HttpError, Response};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method (GET, POST, PATCH, DELETE)
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Request body (POST and PATCH)
    pub body: Option<String>,
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a response (any status)
    Success(Response),
    /// Fail at the transport level
    Error(HttpError),
}

type Key = (String, String);

#[derive(Debug, Default)]
struct Script {
    /// One-shot responses, consumed in order before sticky ones
    queued: HashMap<Key, VecDeque<MockResponse>>,
    /// Responses returned every time
    sticky: HashMap<Key, MockResponse>,
    /// Fallback for unmatched requests
    default_response: Option<MockResponse>,
}

/// Mock HTTP client for testing.
///
/// # Example
///
/// ```ignore
/// use convsync::adapters::mock::{MockHttpClient, MockResponse};
/// use convsync::traits::{HttpClient, HttpError, Headers, Response};
///
/// let client = MockHttpClient::new();
/// client.push_response("POST", "http://store/messages",
///     MockResponse::Error(HttpError::Timeout("slow".into())));
/// client.set_response("POST", "http://store/messages",
///     MockResponse::Success(Response::json_body(201, &body)));
///
/// // First call times out, every later call succeeds.
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    script: Arc<Mutex<Script>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response returned for every `method url` request.
    pub fn set_response(&self, method: &str, url: &str, response: MockResponse) {
        lock(&self.script)
            .sticky
            .insert((method.to_string(), url.to_string()), response);
    }

    /// Queue a one-shot response for the next `method url` request.
    pub fn push_response(&self, method: &str, url: &str, response: MockResponse) {
        lock(&self.script)
            .queued
            .entry((method.to_string(), url.to_string()))
            .or_default()
            .push_back(response);
    }

    /// Set a default response for requests without a specific match.
    pub fn set_default_response(&self, response: MockResponse) {
        lock(&self.script).default_response = Some(response);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        lock(&self.requests).clear();
    }

    fn respond(
        &self,
        method: &str,
        url: &str,
        headers: &Headers,
        body: Option<String>,
    ) -> Result<Response, HttpError> {
        lock(&self.requests).push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body,
        });

        let key = (method.to_string(), url.to_string());
        let mut script = lock(&self.script);
        let response = script
            .queued
            .get_mut(&key)
            .and_then(|queue| queue.pop_front())
            .or_else(|| script.sticky.get(&key).cloned())
            .or_else(|| script.default_response.clone());

        match response {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(HttpError::Other(format!(
                "No mock response for {} {}",
                method, url
            ))),
        }
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.respond("GET", url, headers, None)
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.respond("POST", url, headers, Some(body.to_string()))
    }

    async fn patch(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<Response, HttpError> {
        self.respond("PATCH", url, headers, Some(body.to_string()))
    }

    async fn delete(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.respond("DELETE", url, headers, None)
    }
}
