//! HTTP client for a running mdchat gateway.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use mdchat_core::ChatMessage;
use mdchat_providers::{consume_gateway_stream, StreamedReply};

/// Reply from `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatReply {
    pub text: String,
    pub html: String,
}

#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await
            .with_context(|| format!("Gateway at {} is unreachable", self.base_url))?;
        Ok(checked(response).await?.json().await?)
    }

    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: Option<u32>,
    ) -> Result<ChatReply> {
        let response = self.post_chat("/api/chat", messages, max_tokens).await?;
        response
            .json()
            .await
            .context("Gateway returned an unreadable chat reply")
    }

    /// Streams a reply, calling `on_chunk` as text arrives. Cancelling
    /// returns what has arrived so far.
    pub async fn stream<F>(
        &self,
        messages: &[ChatMessage],
        max_tokens: Option<u32>,
        cancel: &CancellationToken,
        on_chunk: F,
    ) -> Result<StreamedReply>
    where
        F: FnMut(&str),
    {
        let response = self
            .post_chat("/api/chat/stream", messages, max_tokens)
            .await?;
        consume_gateway_stream(Box::pin(response.bytes_stream()), cancel, on_chunk).await
    }

    async fn post_chat(
        &self,
        path: &str,
        messages: &[ChatMessage],
        max_tokens: Option<u32>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, messages = messages.len(), "Posting chat request");
        let response = self
            .http
            .post(&url)
            .json(&json!({ "messages": messages, "max_tokens": max_tokens }))
            .send()
            .await
            .with_context(|| format!("Gateway at {} is unreachable", self.base_url))?;
        checked(response).await
    }
}

/// Turns a non-success response into an error carrying the gateway's
/// `{"error": ...}` message.
async fn checked(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: Value = response.json().await.unwrap_or_default();
    let message = body["error"].as_str().unwrap_or("no error message");
    bail!("Gateway returned {status}: {message}")
}
