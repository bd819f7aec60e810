use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::action::Action;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("flush task failed: {0}")]
    Worker(String),
}

/// Downstream consumer of normalized actions. Delivery guarantees belong to
/// the implementation; callers never retry.
#[async_trait]
pub trait ActionSink: Send + Sync {
    async fn deliver(&self, actions: Vec<Action>) -> Result<(), SinkError>;
}

/// Posts each batch as a JSON array.
pub struct HttpSink {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpSink {
    pub fn new(url: String, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl ActionSink for HttpSink {
    async fn deliver(&self, actions: Vec<Action>) -> Result<(), SinkError> {
        let mut request = self.client.post(&self.url).json(&actions);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::HttpError { status, body });
        }

        tracing::debug!(count = actions.len(), "actions delivered to sink");
        Ok(())
    }
}

/// Used when no sink URL is configured: actions are counted and dropped.
pub struct LogSink;

#[async_trait]
impl ActionSink for LogSink {
    async fn deliver(&self, actions: Vec<Action>) -> Result<(), SinkError> {
        tracing::info!(count = actions.len(), "no sink configured, discarding actions");
        Ok(())
    }
}
