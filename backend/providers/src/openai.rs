use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use mdchat_core::{ChatMessage, CompletionProvider, CompletionRequest, CompletionResponse, Role};

use crate::extract::{clean_response_text, extract_generated_text};
use crate::sse::consume_completion_stream;

pub const DEFAULT_MODEL: &str = "openai.gpt-oss-20b-1:0";
pub const DEFAULT_MAX_TOKENS: u32 = 300;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Provide direct, clear answers without showing your reasoning process.";

/// Chat-completions endpoint on the hosted runtime for `region`.
pub fn regional_base_url(region: &str) -> String {
    format!("https://bedrock-runtime.{region}.amazonaws.com/openai/v1")
}

/// Provider for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    system_prompt: Option<String>,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// `None` sends the conversation without a system prompt.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn body<'a>(&'a self, request: &CompletionRequest, stream: bool) -> ChatCompletionBody<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        let has_system = request.messages.first().is_some_and(|m| m.role == Role::System);
        if let Some(prompt) = self.system_prompt.as_ref().filter(|_| !has_system) {
            messages.push(ChatMessage::system(prompt.clone()));
        }
        messages.extend(request.messages.iter().cloned());

        ChatCompletionBody {
            model: &self.model,
            messages,
            max_completion_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: request.temperature.unwrap_or(self.temperature),
            stream,
        }
    }

    async fn post(&self, body: &ChatCompletionBody<'_>) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .json(body);
        if body.stream {
            builder = builder.header("Accept", "text/event-stream");
        }
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("Completion HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion endpoint returned {}: {}", status, error_body);
        }
        Ok(response)
    }
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_completion_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let start = Instant::now();
        let body = self.body(request, false);

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self.post(&body).await?;
        let json: Value = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        let text = clean_response_text(&extract_generated_text(&json));
        let latency_ms = start.elapsed().as_millis() as u64;
        info!(model = %self.model, latency_ms, chars = text.len(), "Completion received");

        Ok(CompletionResponse {
            text,
            provider: self.name().to_string(),
            model: self.model.clone(),
            latency_ms,
        })
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        chunks: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<String> {
        let body = self.body(request, true);
        debug!(model = %self.model, "Opening completion stream");

        let response = self.post(&body).await?;
        let reply =
            consume_completion_stream(Box::pin(response.bytes_stream()), &chunks, &cancel).await?;

        info!(
            model = %self.model,
            finished = reply.finished,
            chars = reply.text.len(),
            "Completion stream closed"
        );
        Ok(clean_response_text(&reply.text))
    }
}
