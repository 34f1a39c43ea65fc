//! Markdown rendering pipeline for model-generated chat messages.
//!
//! Raw model text is normalized (stray HTML rewritten into Markdown), parsed
//! by either the full pulldown-cmark engine or the dependency-free fallback
//! parser, and finally passed through an allow-list sanitizer. The result is
//! an HTML fragment that is safe to insert into a live document.

pub mod code_block;
pub mod enhance;
pub mod error;
pub mod full;
pub mod inline;
pub mod ir;
pub mod normalize;
pub mod pipeline;
pub mod renderer;
pub mod sanitize;

pub use code_block::CodeBlockAnalyzer;
pub use enhance::enhance_fragment;
pub use error::RenderError;
pub use full::FullParser;
pub use inline::{escape_html, format_inline};
pub use ir::{scan_blocks, Block};
pub use normalize::{normalize_model_text, strip_reasoning};
pub use pipeline::{ContentOrigin, ParserStrategy, RenderOutcome, RenderPipeline};
pub use renderer::{render_blocks, FallbackParser, ParsedFragment};
pub use sanitize::{sanitize_fragment, ALLOWED_TAGS, ANCHOR_ATTRIBUTES};
