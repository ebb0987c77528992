//! Conversation store API client.
//!
//! Thin typed wrappers over the store's REST endpoints. Each method maps to
//! exactly one HTTP request; nothing is retried here.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::adapters::ReqwestHttpClient;
use crate::config::{SyncConfig, DEFAULT_MESSAGE_PAGE_LIMIT, DEFAULT_STORE_URL};
use crate::error::RequestError;
use crate::models::{
    Conversation, ConversationUpdate, CreateConversationRequest, CreateMessageRequest, Message,
    MessageContent, MessageCountResponse, MessageRole,
};
use crate::traits::{ConversationStore, Headers, HttpClient, Response};

/// Client for the conversation store.
///
/// Generic over the transport so tests can script responses with
/// [`MockHttpClient`](crate::adapters::MockHttpClient).
#[derive(Debug, Clone)]
pub struct StoreClient<C: HttpClient = ReqwestHttpClient> {
    /// Base URL without trailing slash
    pub base_url: String,
    http: C,
    headers: Headers,
}

fn json_headers() -> Headers {
    let mut headers = Headers::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("Accept".to_string(), "application/json".to_string());
    headers
}

impl StoreClient<ReqwestHttpClient> {
    /// Client for the default local store.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_STORE_URL)
    }

    /// Client for the store at `base_url`.
    pub fn with_url(base_url: impl Into<String>) -> Self {
        Self::with_http(base_url, ReqwestHttpClient::new())
    }

    /// Client configured from `config`: base URL plus transport timeout.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::with_http(
            config.store_url.clone(),
            ReqwestHttpClient::with_timeout(config.request_timeout),
        )
    }
}

impl Default for StoreClient<ReqwestHttpClient> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: HttpClient> StoreClient<C> {
    /// Client for `base_url` over a custom transport.
    pub fn with_http(base_url: impl Into<String>, http: C) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            headers: json_headers(),
        }
    }

    /// Get a reference to the transport.
    pub fn http(&self) -> &C {
        &self.http
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map non-2xx responses to `RequestError::HttpStatus`.
    fn check(response: Response) -> Result<Response, RequestError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(RequestError::from_response(&response))
        }
    }

    fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RequestError> {
        let response = Self::check(response)?;
        if response.is_empty() {
            return Err(RequestError::InvalidResponse {
                message: format!("empty body with HTTP {}", response.status),
            });
        }
        Ok(response.json::<T>()?)
    }

    fn encode<B: Serialize>(body: &B) -> Result<String, RequestError> {
        serde_json::to_string(body).map_err(|e| RequestError::InvalidRequest {
            message: e.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);
        let response = self.http.get(&url, &self.headers).await?;
        Self::decode(response)
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RequestError> {
        let url = self.url(path);
        tracing::debug!("POST {}", url);
        let body = Self::encode(body)?;
        let response = self.http.post(&url, &body, &self.headers).await?;
        Self::decode(response)
    }

    async fn patch_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RequestError> {
        let url = self.url(path);
        tracing::debug!("PATCH {}", url);
        let body = Self::encode(body)?;
        let response = self.http.patch(&url, &body, &self.headers).await?;
        Self::decode(response)
    }

    /// DELETE and ignore the body; any 2xx is success.
    async fn delete_path(&self, path: &str) -> Result<(), RequestError> {
        let url = self.url(path);
        tracing::debug!("DELETE {}", url);
        let response = self.http.delete(&url, &self.headers).await?;
        Self::check(response).map(|_| ())
    }

    /// List messages with the default page (`limit=100`, `offset=0`).
    pub async fn list_recent_messages(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<Message>, RequestError> {
        self.list_messages(conversation_id, DEFAULT_MESSAGE_PAGE_LIMIT, 0)
            .await
    }
}

#[async_trait]
impl<C: HttpClient> ConversationStore for StoreClient<C> {
    async fn create_conversation(
        &self,
        user_id: i64,
        title: &str,
    ) -> Result<Conversation, RequestError> {
        let body = CreateConversationRequest {
            user_id,
            title: title.to_string(),
        };
        let conv: Conversation = self.post_json("/conversations", &body).await?;
        tracing::info!(
            "Created conversation {} ({}) for user {}",
            conv.conversation_id,
            conv.thread_id,
            user_id
        );
        Ok(conv)
    }

    async fn list_conversations(
        &self,
        user_id: i64,
        include_inactive: bool,
    ) -> Result<Vec<Conversation>, RequestError> {
        self.get_json(&format!(
            "/conversations/user/{}?include_inactive={}",
            user_id, include_inactive
        ))
        .await
    }

    async fn get_conversation(&self, conversation_id: i64) -> Result<Conversation, RequestError> {
        self.get_json(&format!("/conversations/{}", conversation_id))
            .await
    }

    async fn get_conversation_by_thread(
        &self,
        thread_id: &str,
    ) -> Result<Conversation, RequestError> {
        self.get_json(&format!(
            "/conversations/thread/{}",
            urlencoding::encode(thread_id)
        ))
        .await
    }

    async fn update_conversation(
        &self,
        conversation_id: i64,
        update: &ConversationUpdate,
    ) -> Result<Conversation, RequestError> {
        if update.is_empty() {
            return Err(RequestError::InvalidRequest {
                message: "no fields to update".to_string(),
            });
        }
        self.patch_json(&format!("/conversations/{}", conversation_id), update)
            .await
    }

    async fn delete_conversation(
        &self,
        conversation_id: i64,
        soft: bool,
    ) -> Result<(), RequestError> {
        self.delete_path(&format!(
            "/conversations/{}?soft_delete={}",
            conversation_id, soft
        ))
        .await
    }

    async fn create_message(
        &self,
        conversation_id: i64,
        role: MessageRole,
        content: &MessageContent,
    ) -> Result<Message, RequestError> {
        let body = CreateMessageRequest {
            conversation_id,
            role,
            content: content.clone(),
        };
        self.post_json("/messages", &body).await
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, RequestError> {
        self.get_json(&format!(
            "/messages/{}?limit={}&offset={}",
            conversation_id, limit, offset
        ))
        .await
    }

    async fn get_message(&self, message_id: i64) -> Result<Message, RequestError> {
        self.get_json(&format!("/messages/single/{}", message_id))
            .await
    }

    async fn count_messages(&self, conversation_id: i64) -> Result<u64, RequestError> {
        let count: MessageCountResponse = self
            .get_json(&format!("/messages/count/{}", conversation_id))
            .await?;
        Ok(count.message_count)
    }

    async fn delete_message(&self, message_id: i64) -> Result<(), RequestError> {
        self.delete_path(&format!("/messages/{}", message_id)).await
    }

    async fn delete_all_messages(&self, conversation_id: i64) -> Result<(), RequestError> {
        self.delete_path(&format!("/messages/conversation/{}/all", conversation_id))
            .await
    }
}
