//! Delivery of decoded SMS messages to an external chat service.
//!
//! Grounded in the teacher's `GenericWebhook` notification channel
//! (`notifications.rs`), including its `{"title", "content"}` payload
//! shape, but awaited rather than fire-and-forget: the orchestrator needs
//! the delivery outcome to turn a failure into a `SinkFailure` it can log
//! and continue past (§7).

use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook returned non-success status {0}")]
    Status(reqwest::StatusCode),
}

#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, from: &str, content: &str) -> Result<(), SinkError>;
}

pub struct WebhookSink {
    url: String,
    client: Client,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Sink for WebhookSink {
    async fn deliver(&self, from: &str, content: &str) -> Result<(), SinkError> {
        let payload = serde_json::json!({ "title": from, "content": content });
        let resp = self.client.post(&self.url).json(&payload).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            warn!("webhook {} returned {}", self.url, status);
            return Err(SinkError::Status(status));
        }
        Ok(())
    }
}
