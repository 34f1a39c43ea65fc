//! Server-sent event consumers.
//!
//! Two dialects are read here: the upstream OpenAI-compatible completion
//! stream (`choices[0].delta.content` until `[DONE]`) and the gateway's own
//! stream (`data: <chunk>` events, `event: error`, and a final `data: end`).
//! Both buffer partial events across reads and stop promptly when their
//! cancellation token fires, keeping the text received so far.

use std::fmt::Display;

use anyhow::{anyhow, bail, Result};
use eventsource_stream::{Event, Eventsource};
use futures::{stream, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Data payload that terminates the upstream completion stream.
pub const UPSTREAM_DONE: &str = "[DONE]";
/// Data payload that terminates the gateway stream.
pub const GATEWAY_END: &str = "end";
/// Event name the gateway uses to report a failure.
pub const GATEWAY_ERROR_EVENT: &str = "error";

/// Text collected from a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamedReply {
    pub text: String,
    /// True when the stream reached its terminator; false when it was
    /// cancelled or the connection closed early.
    pub finished: bool,
}

enum Next {
    Event(Event),
    Exhausted,
    Cancelled,
}

fn parse_events<S, B, E>(byte_stream: S) -> impl Stream<Item = Result<Event>> + Unpin
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    // A trailing blank line flushes an event the server left unterminated.
    byte_stream
        .map(|item| item.map(|bytes| bytes.as_ref().to_vec()))
        .chain(stream::iter(std::iter::once(Ok(b"\n\n".to_vec()))))
        .eventsource()
        .map(|item| item.map_err(|err| anyhow!("SSE stream error: {err}")))
}

async fn next_event<S>(events: &mut S, cancel: &CancellationToken) -> Result<Next>
where
    S: Stream<Item = Result<Event>> + Unpin,
{
    if cancel.is_cancelled() {
        return Ok(Next::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(Next::Cancelled),
        next = events.next() => match next {
            Some(event) => event.map(Next::Event),
            None => Ok(Next::Exhausted),
        },
    }
}

/// Reads an upstream completion stream, forwarding each text delta on
/// `chunks` in order. A dropped receiver is treated like cancellation.
pub async fn consume_completion_stream<S, B, E>(
    byte_stream: S,
    chunks: &mpsc::Sender<String>,
    cancel: &CancellationToken,
) -> Result<StreamedReply>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut events = parse_events(byte_stream);
    let mut reply = StreamedReply::default();

    loop {
        let event = match next_event(&mut events, cancel).await? {
            Next::Event(event) => event,
            Next::Exhausted => {
                warn!("Completion stream closed without {UPSTREAM_DONE}");
                break;
            }
            Next::Cancelled => {
                debug!(chars = reply.text.len(), "Completion stream cancelled");
                break;
            }
        };

        let data = event.data.trim();
        if data == UPSTREAM_DONE {
            reply.finished = true;
            break;
        }
        if data.is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(data)
            .map_err(|err| anyhow!("Failed to parse SSE JSON: {err}"))?;
        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            bail!("upstream stream error: {message}");
        }

        let Some(delta) = value
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
        else {
            continue;
        };
        reply.text.push_str(delta);
        if chunks.send(delta.to_string()).await.is_err() {
            debug!("Chunk receiver dropped; stopping completion stream");
            break;
        }
    }

    Ok(reply)
}

/// Reads the gateway's chat stream, calling `on_chunk` for every chunk.
/// An `event: error` ends the stream with that message as the error.
pub async fn consume_gateway_stream<S, B, E, F>(
    byte_stream: S,
    cancel: &CancellationToken,
    mut on_chunk: F,
) -> Result<StreamedReply>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
    F: FnMut(&str),
{
    let mut events = parse_events(byte_stream);
    let mut reply = StreamedReply::default();

    loop {
        match next_event(&mut events, cancel).await? {
            Next::Event(event) if event.event == GATEWAY_ERROR_EVENT => {
                bail!("{}", event.data);
            }
            Next::Event(event) if event.data == GATEWAY_END => {
                reply.finished = true;
                break;
            }
            Next::Event(event) => {
                on_chunk(&event.data);
                reply.text.push_str(&event.data);
            }
            Next::Exhausted => {
                warn!("Gateway stream closed without an end marker");
                break;
            }
            Next::Cancelled => break,
        }
    }

    Ok(reply)
}
