//! Completion endpoints (`/api/chat` and `/api/chat/stream`).
//!
//! Both take `{messages, max_tokens?, chat_id?}`. With a `chat_id`, the chat
//! must exist, only one submission may run for it at a time, and the last
//! user message plus the reply are appended to it once the reply is known.

use std::convert::Infallible;
use std::time::Instant;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use mdchat_core::{last_user_message, ChatError, ChatMessage, CompletionRequest};
use mdchat_logging::{ChatEvent, ChatEventLogger};
use mdchat_providers::{GATEWAY_END, GATEWAY_ERROR_EVENT};

use crate::error::ApiError;
use crate::in_flight::InFlightPermit;
use crate::server::GatewayState;

const STREAM_BUFFER: usize = 32;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub chat_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub text: String,
    pub html: String,
}

/// An accepted request, holding the chat's in-flight permit until dropped.
struct Submission {
    request: CompletionRequest,
    chat_id: Option<Uuid>,
    /// Chat id, or a request id for chat-less calls; used in event logs.
    label: String,
    prompt: Option<ChatMessage>,
    _permit: Option<InFlightPermit>,
}

impl Submission {
    async fn admit(
        state: &GatewayState,
        payload: Result<Json<ChatRequest>, JsonRejection>,
        stream: bool,
    ) -> Result<Self, ApiError> {
        let Json(body) = payload?;
        if body.messages.is_empty() {
            return Err(ChatError::EmptyMessages.into());
        }

        let permit = match body.chat_id {
            Some(id) => {
                if state.chats.get(id).await?.is_none() {
                    return Err(ChatError::ChatNotFound(id).into());
                }
                Some(state.in_flight.try_acquire(id).ok_or(ChatError::ChatBusy(id))?)
            }
            None => None,
        };

        let label = match body.chat_id {
            Some(id) => id.to_string(),
            None => format!("req-{}", Uuid::new_v4()),
        };
        ChatEventLogger::log_event(
            &label,
            ChatEvent::CompletionRequested {
                messages: body.messages.len(),
                max_tokens: body.max_tokens,
                stream,
            },
        );

        let prompt = last_user_message(&body.messages).cloned();
        Ok(Self {
            request: CompletionRequest::new(body.messages).with_max_tokens(body.max_tokens),
            chat_id: body.chat_id,
            label,
            prompt,
            _permit: permit,
        })
    }

    fn log_failure(&self, err: &anyhow::Error) -> String {
        let message = format!("{err:#}");
        ChatEventLogger::log_event(
            &self.label,
            ChatEvent::Error {
                error_msg: message.clone(),
            },
        );
        message
    }

    /// Appends the exchange to the chat. A storage failure is logged but
    /// does not fail the reply.
    async fn record_reply(&self, state: &GatewayState, text: &str) {
        let Some(chat_id) = self.chat_id else {
            return;
        };
        let exchange: Vec<ChatMessage> = self
            .prompt
            .iter()
            .cloned()
            .chain(std::iter::once(ChatMessage::assistant(text)))
            .collect();
        match state.chats.append(chat_id, exchange).await {
            Ok(record) => info!(%chat_id, messages = record.messages.len(), "Reply recorded"),
            Err(e) => error!(%chat_id, error = %e, "Failed to record reply"),
        }
    }
}

/// Handler for `POST /api/chat`.
pub async fn chat(
    State(state): State<GatewayState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let submission = Submission::admit(&state, payload, false).await?;

    let response = match state.provider.complete(&submission.request).await {
        Ok(response) => response,
        Err(e) => return Err(ApiError::internal(submission.log_failure(&e))),
    };
    ChatEventLogger::log_event(
        &submission.label,
        ChatEvent::CompletionFinished {
            chars: response.text.chars().count(),
            latency_ms: response.latency_ms,
            complete: true,
        },
    );

    submission.record_reply(&state, &response.text).await;
    let html = state.render_reply(&submission.label, &response.text);
    Ok(Json(ChatReply {
        text: response.text,
        html,
    }))
}

/// Handler for `POST /api/chat/stream`.
///
/// Emits one `data:` event per chunk, then `data: end`, or `event: error`
/// with the failure message. Dropping the connection cancels the upstream
/// stream; whatever text arrived by then is still recorded.
pub async fn chat_stream(
    State(state): State<GatewayState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let submission = Submission::admit(&state, payload, true).await?;

    let (chunk_tx, chunk_rx) = mpsc::channel::<String>(STREAM_BUFFER);
    let (done_tx, done_rx) = oneshot::channel::<Result<(), String>>();
    let cancel = CancellationToken::new();

    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        let started = Instant::now();
        let outcome = state
            .provider
            .stream(&submission.request, chunk_tx, task_cancel.clone())
            .await;
        let result = match outcome {
            Ok(text) => {
                ChatEventLogger::log_event(
                    &submission.label,
                    ChatEvent::CompletionFinished {
                        chars: text.chars().count(),
                        latency_ms: started.elapsed().as_millis() as u64,
                        complete: !task_cancel.is_cancelled(),
                    },
                );
                if !text.is_empty() {
                    submission.record_reply(&state, &text).await;
                }
                Ok(())
            }
            Err(e) => Err(submission.log_failure(&e)),
        };
        let _ = done_tx.send(result);
    });

    let guard = cancel.drop_guard();
    let chunks = ReceiverStream::new(chunk_rx).map(|chunk| Ok(data_event(&chunk)));
    let tail = stream::once(async move {
        let _guard = guard;
        let event = match done_rx.await {
            Ok(Ok(())) => Event::default().data(GATEWAY_END),
            Ok(Err(message)) => data_event(&message).event(GATEWAY_ERROR_EVENT),
            Err(_) => Event::default()
                .event(GATEWAY_ERROR_EVENT)
                .data("stream aborted"),
        };
        Ok::<_, Infallible>(event)
    });

    Ok(Sse::new(chunks.chain(tail)).keep_alive(KeepAlive::default()))
}

/// SSE fields cannot carry carriage returns; line breaks become `\n`, which
/// the client rejoins from consecutive `data:` lines.
fn data_event(text: &str) -> Event {
    Event::default().data(text.replace("\r\n", "\n").replace('\r', "\n"))
}
