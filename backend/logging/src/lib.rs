//! Telemetry and structured logging components for mdchat.
//!
//! Handles log redaction, JSON output, file rotation, and chat event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{CHAT_EVENTS_TARGET, ChatEvent, ChatEventLogger, EventLogEntry};
pub use logger::{build_filter, init_logger};
pub use redact::redact_sensitive_data;
