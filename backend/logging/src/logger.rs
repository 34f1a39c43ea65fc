//! Structured Logger
//!
//! Wraps `tracing` with console output (plain or JSON), optional daily
//! rolling NDJSON files, and `RUST_LOG`-based level control.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "mdchat.log";

/// Builds the filter: `RUST_LOG` when set, `level` otherwise. An invalid
/// directive falls back to `info`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global structured logger.
///
/// Console output goes to stderr so stdout stays clean for command output.
/// With `log_dir`, NDJSON is also written to `mdchat.log.YYYY-MM-DD`.
/// Calling this more than once is harmless.
pub fn init_logger(level: &str, log_dir: Option<&Path>, json: bool) {
    let file_layer = log_dir.map(|dir| {
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
        fmt::layer().json().with_writer(appender).with_ansi(false)
    });

    let (json_console, plain_console) = if json {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(true);
        (None, Some(layer))
    };

    let _ = tracing_subscriber::registry()
        .with(build_filter(level))
        .with(json_console)
        .with(plain_console)
        .with(file_layer)
        .try_init();
}
