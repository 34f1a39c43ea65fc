use thiserror::Error;

/// Failure of a rendering engine. Never surfaced past the pipeline, which
/// recovers by re-rendering with the fallback parser.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("markdown engine panicked: {0}")]
    Engine(String),
}
