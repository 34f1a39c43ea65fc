use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use mdchat_core::{CompletionProvider, CompletionRequest, CompletionResponse};

/// A mock completion provider that returns canned responses.
pub struct MockProvider {
    name: String,
    chunks: Vec<String>,
    failure: Option<String>,
    delay: Duration,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chunks: vec!["Mock response".to_string()],
            failure: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.chunks = vec![response.into()];
        self
    }

    /// Streams these chunks; `complete` returns them joined.
    pub fn with_chunks<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Sleeps before answering (and between streamed chunks).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(&self, request: &CompletionRequest) -> Result<()> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        match &self.failure {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        self.record(request)?;
        tokio::time::sleep(self.delay).await;
        Ok(CompletionResponse {
            text: self.chunks.concat(),
            provider: self.name.clone(),
            model: "mock".to_string(),
            latency_ms: self.delay.as_millis() as u64,
        })
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        chunks: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<String> {
        self.record(request)?;
        let mut text = String::new();
        for chunk in &self.chunks {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.delay) => {}
            }
            text.push_str(chunk);
            if chunks.send(chunk.clone()).await.is_err() {
                break;
            }
        }
        Ok(text)
    }
}
