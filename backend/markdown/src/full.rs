//! Full Markdown engine backed by pulldown-cmark.
//!
//! Configured for chat output: single newlines become `<br>`, GitHub tables
//! are enabled, quotes are kept literal (no smart punctuation). Raw HTML in
//! the source is emitted as escaped text, and links open in a new tab.

use std::any::Any;
use std::panic;

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::code_block::CodeBlockAnalyzer;
use crate::error::RenderError;
use crate::inline::escape_html;
use crate::renderer::ParsedFragment;

#[derive(Debug, Clone, Copy)]
pub struct FullParser {
    options: Options,
}

impl Default for FullParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FullParser {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        Self { options }
    }

    pub fn render(&self, markdown: &str) -> Result<String, RenderError> {
        self.parse(markdown).map(|parsed| parsed.html)
    }

    /// Parses Markdown; a panic inside the engine is reported as an error so
    /// the caller can fall back.
    pub fn parse(&self, markdown: &str) -> Result<ParsedFragment, RenderError> {
        let options = self.options;
        catch_engine_panic(move || render_events(markdown, options))
    }
}

/// Runs an engine, turning a panic into [`RenderError::Engine`].
pub(crate) fn catch_engine_panic<F>(engine: F) -> Result<ParsedFragment, RenderError>
where
    F: FnOnce() -> ParsedFragment + panic::UnwindSafe,
{
    panic::catch_unwind(engine)
        .map_err(|payload| RenderError::Engine(panic_message(payload.as_ref())))
}

fn render_events(markdown: &str, options: Options) -> ParsedFragment {
    let mut code_languages = Vec::new();
    let events: Vec<Event<'_>> = Parser::new_ext(markdown, options)
        .map(|event| rewrite_event(event, &mut code_languages))
        .collect();

    let mut html = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html, events.into_iter());
    ParsedFragment {
        html,
        code_languages,
    }
}

fn rewrite_event<'a>(event: Event<'a>, code_languages: &mut Vec<Option<String>>) -> Event<'a> {
    match event {
        Event::Start(Tag::CodeBlock(kind)) => {
            let language = match &kind {
                CodeBlockKind::Fenced(info) => CodeBlockAnalyzer::fence_language(info),
                CodeBlockKind::Indented => None,
            };
            code_languages.push(language);
            Event::Start(Tag::CodeBlock(kind))
        }
        Event::SoftBreak => Event::HardBreak,
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        // Images become plain links; the alt text is the link label.
        Event::Start(Tag::Link { dest_url, .. }) | Event::Start(Tag::Image { dest_url, .. }) => {
            Event::InlineHtml(CowStr::from(format!(
                r#"<a href="{}" target="_blank" rel="noopener noreferrer">"#,
                escape_html(&dest_url)
            )))
        }
        Event::End(TagEnd::Link) | Event::End(TagEnd::Image) => {
            Event::InlineHtml(CowStr::Borrowed("</a>"))
        }
        other => other,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_breaks_become_line_breaks() {
        let html = FullParser::new().render("**Hi**\nthere").unwrap();
        assert!(html.contains("<strong>Hi</strong><br />"));
        assert!(html.contains("there"));
    }

    #[test]
    fn quotes_stay_literal() {
        let html = FullParser::new().render("\"quoted\" and 'single'").unwrap();
        assert!(html.contains("&quot;quoted&quot;") || html.contains("\"quoted\""));
        assert!(!html.contains('\u{201c}'));
    }

    #[test]
    fn tables_are_enabled() {
        let html = FullParser::new().render("| a | b |\n|---|---|\n| 1 | 2 |").unwrap();
        assert!(html.contains("<table>"));
        assert_eq!(html.matches("<th").count(), 2);
        assert_eq!(html.matches("<td").count(), 2);
    }

    #[test]
    fn raw_html_is_escaped() {
        let html = FullParser::new().render("before <script>alert(1)</script> after").unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn links_get_target_and_rel() {
        let html = FullParser::new().render("[docs](https://example.com)").unwrap();
        assert!(html.contains(
            r#"<a href="https://example.com" target="_blank" rel="noopener noreferrer">docs</a>"#
        ));
    }

    #[test]
    fn collects_code_languages() {
        let parsed = FullParser::new()
            .parse("```Python\nprint(1)\n```\n\n    indented\n")
            .unwrap();
        assert_eq!(parsed.code_languages, vec![Some("python".to_string()), None]);
    }

    #[test]
    fn panic_payloads_are_described() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
