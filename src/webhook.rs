//! Webhook delivery
//!
//! `WebhookSender` posts a rendered message and reports the raw response;
//! classifying the status is left to the dispatcher.

use crate::error::Result;
use crate::message::NotificationMessage;
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::sync::Mutex;

/// Status and body returned by the webhook endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Slack incoming webhooks answer exactly 200 on success
    pub fn is_delivered(&self) -> bool {
        self.status == 200
    }
}

/// Posts messages to a webhook URL
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// POST `message` as JSON to `url`
    ///
    /// Transport failures are errors; any HTTP response, including error
    /// statuses, is returned as a `WebhookResponse`.
    async fn post(&self, url: &str, message: &NotificationMessage) -> Result<WebhookResponse>;
}

/// `reqwest`-backed sender
pub struct HttpWebhookSender {
    client: reqwest::Client,
}

impl HttpWebhookSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn post(&self, url: &str, message: &NotificationMessage) -> Result<WebhookResponse> {
        let body = message.to_body()?;

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, body.len())
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(WebhookResponse { status, body })
    }
}

/// A message captured by `MemoryWebhookSender`
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub url: String,
    pub message: NotificationMessage,
}

/// In-memory sender that records posts and answers with a fixed response
pub struct MemoryWebhookSender {
    response: WebhookResponse,
    posts: Mutex<Vec<RecordedPost>>,
}

impl MemoryWebhookSender {
    /// Sender that answers every post with `status` and `body`
    pub fn responding(status: u16, body: impl Into<String>) -> Self {
        Self {
            response: WebhookResponse::new(status, body),
            posts: Mutex::new(Vec::new()),
        }
    }

    /// Posts received so far, oldest first
    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MemoryWebhookSender {
    fn default() -> Self {
        Self::responding(200, "ok")
    }
}

#[async_trait]
impl WebhookSender for MemoryWebhookSender {
    async fn post(&self, url: &str, message: &NotificationMessage) -> Result<WebhookResponse> {
        self.posts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedPost {
                url: url.to_string(),
                message: message.clone(),
            });
        Ok(self.response.clone())
    }
}
