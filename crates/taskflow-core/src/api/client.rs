//! ApiClient: REST calls for tasks, notifications and chat.
//!
//! Every request carries `Authorization: Bearer <token>` when a token is
//! configured. Non-2xx responses become [`ApiError::Status`] with the
//! response body attached.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

use crate::chat::{ChatBackend, ChatMessage, ChatReply, Conversation, SaveMessage};
use crate::error::ApiError;
use crate::reminder::{FeedNotification, NotificationFeed};
use crate::storage::ApiConfig;
use crate::task::{Task, TaskBackend, TaskCreate, TaskQuery, TaskUpdate};

#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    #[serde(default)]
    notifications: Vec<FeedNotification>,
}

/// Client for the TaskFlow REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    /// # Errors
    /// Returns an error if `base_url` is not a valid URL or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(base_url)?;
        // Keep any path prefix when joining relative endpoint paths.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// # Errors
    /// See [`ApiClient::new`].
    pub fn from_config(config: &ApiConfig, token: Option<String>) -> Result<Self, ApiError> {
        Self::new(&config.base_url, token, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn endpoint(&self, path: &str, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.join(path)?;
        if !segments.is_empty() {
            let mut parts = url
                .path_segments_mut()
                .map_err(|()| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            parts.pop_if_empty();
            for segment in segments {
                parts.push(segment);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::debug!(%method, %url, "api request");
        let builder = self.http_client.request(method, url);
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), %body, "api error response");
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        let resp = Self::check(builder.send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn send_empty(builder: RequestBuilder) -> Result<(), ApiError> {
        Self::check(builder.send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskBackend for ApiClient {
    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, ApiError> {
        let url = self.endpoint("api/tasks/", &[])?;
        Self::send_json(self.request(Method::GET, url).query(&query.to_params())).await
    }

    async fn create_task(&self, data: &TaskCreate) -> Result<Task, ApiError> {
        let url = self.endpoint("api/tasks/", &[])?;
        Self::send_json(self.request(Method::POST, url).json(data)).await
    }

    async fn update_task(&self, id: &str, data: &TaskUpdate) -> Result<Task, ApiError> {
        let url = self.endpoint("api/tasks/", &[id])?;
        Self::send_json(self.request(Method::PUT, url).json(data)).await
    }

    async fn toggle_task(&self, id: &str, completed: bool) -> Result<Task, ApiError> {
        let url = self.endpoint("api/tasks/", &[id, "complete"])?;
        let body = json!({ "completed": completed });
        Self::send_json(self.request(Method::PATCH, url).json(&body)).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
        let url = self.endpoint("api/tasks/", &[id])?;
        Self::send_empty(self.request(Method::DELETE, url)).await
    }
}

#[async_trait]
impl NotificationFeed for ApiClient {
    async fn pending_notifications(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<FeedNotification>, ApiError> {
        let url = self.endpoint("api/events/notifications", &[])?;
        let envelope: FeedEnvelope = Self::send_json(
            self.request(Method::GET, url)
                .query(&[("limit", limit.to_string()), ("user_id", user_id.to_string())]),
        )
        .await?;
        Ok(envelope.notifications)
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn send_chat(&self, messages: &[ChatMessage], model: &str) -> Result<ChatReply, ApiError> {
        let url = self.endpoint("api/chat/", &[])?;
        let body = json!({ "messages": messages, "model": model });
        Self::send_json(self.request(Method::POST, url).json(&body)).await
    }

    async fn save_message(&self, message: &SaveMessage) -> Result<(), ApiError> {
        let url = self.endpoint("api/chat/save-message", &[])?;
        Self::send_empty(self.request(Method::POST, url).json(message)).await
    }

    async fn chat_history(&self, conversation_id: i64, limit: u32) -> Result<Vec<ChatMessage>, ApiError> {
        let url = self.endpoint("api/chat/history", &[])?;
        Self::send_json(self.request(Method::GET, url).query(&[
            ("conversation_id", conversation_id.to_string()),
            ("limit", limit.to_string()),
        ]))
        .await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let url = self.endpoint("api/conversations/", &[])?;
        Self::send_json(self.request(Method::GET, url)).await
    }

    async fn create_conversation(&self, title: &str) -> Result<Conversation, ApiError> {
        let url = self.endpoint("api/conversations/", &[])?;
        Self::send_json(self.request(Method::POST, url).json(&json!({ "title": title }))).await
    }

    async fn rename_conversation(&self, id: i64, title: &str) -> Result<Conversation, ApiError> {
        let url = self.endpoint("api/conversations/", &[&id.to_string()])?;
        Self::send_json(self.request(Method::PATCH, url).json(&json!({ "title": title }))).await
    }

    async fn delete_conversation(&self, id: i64) -> Result<(), ApiError> {
        let url = self.endpoint("api/conversations/", &[&id.to_string()])?;
        Self::send_empty(self.request(Method::DELETE, url)).await
    }
}
