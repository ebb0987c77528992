//! Mock implementations for testing.
//!
//! Test doubles for the trait abstractions, so session and persistence
//! logic can be exercised without a running store.
//!
//! # Available Mocks
//!
//! - [`MockHttpClient`] - HTTP client with scripted responses
//! - [`InMemoryStore`] - conversation store with failure injection

pub mod http;
pub mod store;

pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use store::{InMemoryStore, StoreOp};
