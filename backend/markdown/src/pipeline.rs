//! Rendering pipeline: normalize, parse, sanitize, and optionally enhance.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::enhance::enhance_fragment;
use crate::error::RenderError;
use crate::full::FullParser;
use crate::inline::escape_html;
use crate::normalize::normalize_model_text;
use crate::renderer::{FallbackParser, ParsedFragment};
use crate::sanitize::sanitize_fragment;

/// Which Markdown engine the pipeline prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserStrategy {
    /// pulldown-cmark, falling back on failure.
    #[default]
    Full,
    /// The dependency-free parser only.
    Fallback,
}

/// Who wrote a message. User text is escaped verbatim; assistant text is
/// untrusted Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentOrigin {
    User,
    Assistant,
}

/// A rendered fragment plus how it was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    pub html: String,
    pub code_languages: Vec<Option<String>>,
    /// True when the full engine failed and the fallback parser was used.
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderPipeline {
    strategy: ParserStrategy,
    full: FullParser,
    fallback: FallbackParser,
}

impl RenderPipeline {
    pub fn new(strategy: ParserStrategy) -> Self {
        Self {
            strategy,
            full: FullParser::new(),
            fallback: FallbackParser::new(),
        }
    }

    pub fn strategy(&self) -> ParserStrategy {
        self.strategy
    }

    /// Renders message content to a sanitized HTML fragment.
    pub fn render(&self, text: &str, origin: ContentOrigin) -> String {
        self.render_detailed(text, origin).html
    }

    /// Renders untrusted assistant Markdown.
    pub fn render_markdown(&self, text: &str) -> String {
        self.render(text, ContentOrigin::Assistant)
    }

    /// Renders and then applies the post-render enhancer.
    pub fn render_enhanced(&self, text: &str, origin: ContentOrigin) -> String {
        let outcome = self.render_detailed(text, origin);
        if outcome.html.is_empty() {
            return outcome.html;
        }
        enhance_fragment(&outcome.html, &outcome.code_languages)
    }

    pub fn render_detailed(&self, text: &str, origin: ContentOrigin) -> RenderOutcome {
        self.render_detailed_with(text, origin, |markdown| self.full.parse(markdown))
    }

    /// Same as [`render_detailed`](Self::render_detailed) with `full` standing
    /// in for the preferred engine.
    pub(crate) fn render_detailed_with<F>(
        &self,
        text: &str,
        origin: ContentOrigin,
        full: F,
    ) -> RenderOutcome
    where
        F: FnOnce(&str) -> Result<ParsedFragment, RenderError>,
    {
        match origin {
            ContentOrigin::User => RenderOutcome {
                html: escape_html(text),
                ..RenderOutcome::default()
            },
            ContentOrigin::Assistant => {
                let markdown = normalize_model_text(text);
                if markdown.is_empty() {
                    return RenderOutcome::default();
                }
                let (parsed, used_fallback) = self.parse_with(&markdown, full);
                RenderOutcome {
                    html: sanitize_fragment(&parsed.html),
                    code_languages: parsed.code_languages,
                    used_fallback,
                }
            }
        }
    }

    fn parse_with<F>(&self, markdown: &str, full: F) -> (ParsedFragment, bool)
    where
        F: FnOnce(&str) -> Result<ParsedFragment, RenderError>,
    {
        match self.strategy {
            ParserStrategy::Fallback => (self.fallback.parse(markdown), false),
            ParserStrategy::Full => match full(markdown) {
                Ok(parsed) => (parsed, false),
                Err(err) => {
                    warn!(error = %err, "Full markdown parser failed; re-rendering with fallback");
                    (self.fallback.parse(markdown), true)
                }
            },
        }
    }
}

impl From<ParserStrategy> for RenderPipeline {
    fn from(strategy: ParserStrategy) -> Self {
        debug!(?strategy, "Building render pipeline");
        Self::new(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::full::catch_engine_panic;
    use crate::sanitize::tests::assert_allow_listed;

    const STRATEGIES: [ParserStrategy; 2] = [ParserStrategy::Full, ParserStrategy::Fallback];

    fn render(strategy: ParserStrategy, text: &str) -> String {
        RenderPipeline::new(strategy).render_markdown(text)
    }

    #[test]
    fn empty_input_renders_empty_on_both_paths() {
        for strategy in STRATEGIES {
            assert_eq!(render(strategy, ""), "");
            assert_eq!(RenderPipeline::new(strategy).render_enhanced("", ContentOrigin::Assistant), "");
        }
    }

    #[test]
    fn adversarial_input_is_fully_stripped() {
        let inputs = [
            "<script>alert(1)</script>",
            "&lt;script&gt;alert(1)&lt;/script&gt;",
            "hello <img src=x onerror=alert(1)> world",
            "[x](javascript:alert(1))",
            "```\n<script>alert(1)</script>\n```",
            "<a href=\"javascript:alert(1)\" onclick=\"alert(2)\">click</a>",
            "| <b>a</b> | b |\n|---|---|\n| <iframe> | `<style>` |",
        ];
        for strategy in STRATEGIES {
            for input in inputs {
                let html = render(strategy, input);
                assert_allow_listed(&html);
                assert!(!html.contains("<script"), "{strategy:?}: {html}");
                assert!(!html.contains("javascript:"), "{strategy:?}: {html}");
            }
        }
    }

    #[test]
    fn escaped_input_is_not_double_escaped() {
        for strategy in STRATEGIES {
            let html = render(strategy, "Tom &amp; Jerry");
            assert!(html.contains("Tom &amp; Jerry"), "{strategy:?}: {html}");
            assert!(!html.contains("&amp;amp;"), "{strategy:?}: {html}");
        }
    }

    #[test]
    fn heading_bold_and_italic_round_trip() {
        for strategy in STRATEGIES {
            let html = render(strategy, "# Title\n\nSome **bold** and *italic* text.");
            assert!(html.contains("<h1>Title</h1>"), "{strategy:?}: {html}");
            assert!(html.contains("<p>Some <strong>bold</strong> and <em>italic</em> text.</p>"));
        }
    }

    #[test]
    fn unterminated_fence_renders_code() {
        for strategy in STRATEGIES {
            let html = render(strategy, "```\nline1\nline2");
            assert!(html.contains("<pre><code>line1\nline2"), "{strategy:?}: {html}");
        }
    }

    #[test]
    fn table_cell_counts_match_header() {
        for strategy in STRATEGIES {
            let html = render(strategy, "| a | b | c |\n|---|:-:|---|\n| 1 | 2 | 3 |");
            assert!(html.contains("<thead>") && html.contains("<tbody>"), "{strategy:?}: {html}");
            assert_eq!(html.matches("<th>").count(), 3, "{strategy:?}: {html}");
            assert_eq!(html.matches("<td>").count(), 3, "{strategy:?}: {html}");
        }
    }

    #[test]
    fn model_html_is_normalized_before_parsing() {
        for strategy in STRATEGIES {
            let html = render(strategy, "<strong>Hi</strong><br>there");
            assert!(!html.contains("&lt;strong&gt;"), "{strategy:?}: {html}");
            assert!(html.contains("<strong>Hi</strong><br>"), "{strategy:?}: {html}");
            assert!(html.contains("there"), "{strategy:?}: {html}");
        }
    }

    #[test]
    fn consecutive_items_render_as_one_list() {
        for strategy in STRATEGIES {
            let html = render(strategy, "- item\n- item\n- item");
            assert_eq!(html.matches("<ul>").count(), 1, "{strategy:?}: {html}");
            assert_eq!(html.matches("<li>").count(), 3, "{strategy:?}: {html}");
        }
    }

    #[test]
    fn user_content_is_escaped_not_parsed() {
        let pipeline = RenderPipeline::default();
        let html = pipeline.render("**not bold** <b>x</b>", ContentOrigin::User);
        assert_eq!(html, "**not bold** &lt;b&gt;x&lt;/b&gt;");
    }

    #[test]
    fn enhanced_render_labels_code_from_fence() {
        for strategy in STRATEGIES {
            let html = RenderPipeline::new(strategy)
                .render_enhanced("```go\npackage main\n```", ContentOrigin::Assistant);
            assert!(html.contains(r#"data-language="go""#), "{strategy:?}: {html}");
        }
    }

    #[test]
    fn links_survive_sanitization() {
        for strategy in STRATEGIES {
            let html = render(strategy, "see [docs](https://example.com)");
            assert!(
                html.contains(r#"<a href="https://example.com" target="_blank" rel="noopener noreferrer">docs</a>"#),
                "{strategy:?}: {html}"
            );
        }
    }

    #[test]
    fn successful_full_render_does_not_report_fallback() {
        let outcome = RenderPipeline::new(ParserStrategy::Full)
            .render_detailed("plain", ContentOrigin::Assistant);
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.html, "<p>plain</p>\n");
    }

    #[test]
    fn failing_engine_falls_back_to_sanitized_fallback_html() {
        let pipeline = RenderPipeline::new(ParserStrategy::Full);
        let text = "Some **bold**\nline <img src=x onerror=alert(1)>\n\n```rust\nfn x() {}\n```";

        let outcome = pipeline.render_detailed_with(text, ContentOrigin::Assistant, |_| {
            Err(RenderError::Engine("engine unavailable".into()))
        });

        let expected = RenderPipeline::new(ParserStrategy::Fallback)
            .render_detailed(text, ContentOrigin::Assistant);
        assert!(outcome.used_fallback);
        assert_eq!(outcome.html, expected.html);
        assert_eq!(outcome.code_languages, vec![Some("rust".to_string())]);
        assert!(outcome.html.contains("<strong>bold</strong><br>"), "{}", outcome.html);
        assert_allow_listed(&outcome.html);
    }

    #[test]
    fn panicking_engine_is_caught_and_falls_back() {
        let pipeline = RenderPipeline::new(ParserStrategy::Full);
        let outcome = pipeline.render_detailed_with("# Title", ContentOrigin::Assistant, |_| {
            catch_engine_panic(|| panic!("engine exploded"))
        });
        assert!(outcome.used_fallback);
        assert_eq!(outcome.html, "<h1>Title</h1>");
    }

    #[test]
    fn fallback_strategy_never_calls_the_engine() {
        let pipeline = RenderPipeline::new(ParserStrategy::Fallback);
        let outcome = pipeline.render_detailed_with("plain", ContentOrigin::Assistant, |_| {
            panic!("full engine must not run")
        });
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.html, "<p>plain</p>");
    }

    #[test]
    fn strategy_deserializes_from_lowercase() {
        let strategy: ParserStrategy = serde_json::from_str("\"fallback\"").unwrap();
        assert_eq!(strategy, ParserStrategy::Fallback);
        assert_eq!(RenderPipeline::from(strategy).strategy(), ParserStrategy::Fallback);
    }
}
