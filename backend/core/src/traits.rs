use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::message::ChatMessage;

/// Trait for completion backends.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name (e.g., "openai-compatible", "mock").
    fn name(&self) -> &str;

    /// Send a completion request and return the full response.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;

    /// Stream a completion. Each text chunk is sent on `chunks` in order.
    /// Cancelling `cancel` stops reading; the text accumulated so far is
    /// returned either way.
    async fn stream(
        &self,
        request: &CompletionRequest,
        chunks: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<String>;
}

/// Request to a completion provider. Unset limits use the provider defaults.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Response from a completion provider.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
}
