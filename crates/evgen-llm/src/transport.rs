//! Completion transport contract and its reqwest-backed implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info_span, Instrument};

use crate::wire::{CompletionRequest, CompletionResponse};

/// What came back from one completion call, before any semantic checks.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReply {
    pub status: u16,
    /// Decoded body of a successful call; `None` when the service sent nothing.
    pub body: Option<CompletionResponse>,
    /// Raw body text of an unsuccessful call.
    pub error_text: Option<String>,
}

impl CompletionReply {
    pub fn ok(body: CompletionResponse) -> Self {
        Self {
            status: 200,
            body: Some(body),
            error_text: None,
        }
    }

    pub fn failed(status: u16, error_text: impl Into<String>) -> Self {
        Self {
            status,
            body: None,
            error_text: Some(error_text.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("undecodable completion body (status {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },
    #[error("transport shut down")]
    Closed,
}

#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, TransportError>;
}

#[derive(Debug, Clone)]
pub struct CompletionClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub max_concurrency: usize,
}

impl Default for CompletionClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            user_agent: None,
            max_concurrency: 4,
        }
    }
}

#[derive(Debug)]
pub struct HttpCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    limit: Arc<Semaphore>,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
            limit: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: &CompletionRequest) -> Result<CompletionReply, TransportError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        debug!(status = status.as_u16(), bytes = text.len(), "completion reply received");

        if !status.is_success() {
            return Ok(CompletionReply::failed(status.as_u16(), text));
        }

        let trimmed = text.trim();
        let body = if trimmed.is_empty() || trimmed == "null" {
            None
        } else {
            let decoded = serde_json::from_str::<CompletionResponse>(trimmed).map_err(|source| {
                TransportError::Decode {
                    status: status.as_u16(),
                    source,
                }
            })?;
            Some(decoded)
        };

        Ok(CompletionReply {
            status: status.as_u16(),
            body,
            error_text: None,
        })
    }
}

#[async_trait]
impl CompletionTransport for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, TransportError> {
        let _permit = self
            .limit
            .acquire()
            .await
            .map_err(|_| TransportError::Closed)?;

        let span = info_span!("completion_request", model = %request.model, endpoint = %self.endpoint);
        self.send(request).instrument(span).await
    }
}
