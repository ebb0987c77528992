//! Mock configurations for test fixtures.
//!
//! Re-exports the doubles from `convsync::adapters::mock` and adds a
//! builder for scripting a `MockHttpClient`.

pub use convsync::adapters::mock::{InMemoryStore, MockHttpClient, MockResponse, StoreOp};
pub use convsync::traits::HttpError;

use bytes::Bytes;
use convsync::traits::Response;

/// Builder for a scripted `MockHttpClient`.
pub struct MockHttpConfig {
    client: MockHttpClient,
}

impl MockHttpConfig {
    pub fn new() -> Self {
        Self {
            client: MockHttpClient::new(),
        }
    }

    /// Answer every `method url` with `status` and a JSON body.
    pub fn with_json_response(self, method: &str, url: &str, status: u16, json: &str) -> Self {
        self.client.set_response(
            method,
            url,
            MockResponse::Success(Response::new(status, Bytes::from(json.to_string()))),
        );
        self
    }

    /// Fail the next `method url` at the transport level.
    pub fn with_transport_failure_once(self, method: &str, url: &str) -> Self {
        self.client.push_response(
            method,
            url,
            MockResponse::Error(HttpError::ConnectionFailed("connection reset".to_string())),
        );
        self
    }

    /// Answer unmatched requests with `status` and `body`.
    pub fn with_default_success(self, status: u16, body: &str) -> Self {
        self.client
            .set_default_response(MockResponse::Success(Response::new(
                status,
                Bytes::from(body.to_string()),
            )));
        self
    }

    pub fn build(self) -> MockHttpClient {
        self.client
    }
}

impl Default for MockHttpConfig {
    fn default() -> Self {
        Self::new()
    }
}
