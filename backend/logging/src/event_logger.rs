//! Chat Event Logger
//!
//! Structured chat events (completion requested/finished, render fallback,
//! errors) emitted under the `chat_events` target after redaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::redact::redact_sensitive_data;

pub const CHAT_EVENTS_TARGET: &str = "chat_events";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    CompletionRequested {
        messages: usize,
        max_tokens: Option<u32>,
        stream: bool,
    },
    CompletionFinished {
        chars: usize,
        latency_ms: u64,
        /// False when a stream was cut short.
        complete: bool,
    },
    RenderFallback {
        reason: String,
    },
    Error {
        error_msg: String,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    /// Chat id, or a request id for requests outside any stored chat.
    pub chat_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: ChatEvent,
}

pub struct ChatEventLogger;

impl ChatEventLogger {
    /// Redacts free-text fields and emits the event; returns the entry as
    /// logged.
    pub fn log_event(chat_id: &str, mut event: ChatEvent) -> EventLogEntry {
        match &mut event {
            ChatEvent::RenderFallback { reason } => *reason = redact_sensitive_data(reason),
            ChatEvent::Error { error_msg } => *error_msg = redact_sensitive_data(error_msg),
            ChatEvent::CompletionRequested { .. } | ChatEvent::CompletionFinished { .. } => {}
        }

        let entry = EventLogEntry {
            chat_id: chat_id.into(),
            timestamp: Utc::now(),
            event,
        };

        let payload = serde_json::to_string(&entry).unwrap_or_default();
        match entry.event {
            ChatEvent::Error { .. } | ChatEvent::RenderFallback { .. } => {
                warn!(target: "chat_events", event = %payload, "Chat event");
            }
            _ => info!(target: "chat_events", event = %payload, "Chat event"),
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_redacted() {
        let entry = ChatEventLogger::log_event(
            "chat-1",
            ChatEvent::Error {
                error_msg: "upstream rejected Bearer abc.def.ghi".into(),
            },
        );
        assert_eq!(
            entry.event,
            ChatEvent::Error {
                error_msg: "upstream rejected [REDACTED_TOKEN]".into()
            }
        );
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let entry = ChatEventLogger::log_event(
            "chat-2",
            ChatEvent::CompletionFinished {
                chars: 12,
                latency_ms: 40,
                complete: true,
            },
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event"]["type"], "completion_finished");
        assert_eq!(json["chat_id"], "chat-2");
    }
}
