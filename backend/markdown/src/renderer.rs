//! Fallback renderer for the block IR.
//!
//! Turns the block stream into HTML without any Markdown dependency. This is
//! the path used when the full engine is unavailable or fails, so it never
//! panics and never drops content.

use crate::inline::{escape_html, format_inline};
use crate::ir::{scan_blocks, Block};

/// Unsanitized parser output plus the fence language of each code block, in
/// document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFragment {
    pub html: String,
    pub code_languages: Vec<Option<String>>,
}

/// Dependency-free Markdown parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackParser;

impl FallbackParser {
    pub fn new() -> Self {
        Self
    }

    /// Renders Markdown to HTML.
    pub fn render(&self, markdown: &str) -> String {
        self.parse(markdown).html
    }

    pub fn parse(&self, markdown: &str) -> ParsedFragment {
        let blocks = scan_blocks(markdown);
        let code_languages = blocks
            .iter()
            .filter_map(|block| match block {
                Block::CodeBlock { language, .. } => Some(language.clone()),
                _ => None,
            })
            .collect();
        ParsedFragment {
            html: render_blocks(&blocks),
            code_languages,
        }
    }
}

/// Renders blocks to HTML, one block per line.
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        if !out.is_empty() {
            out.push('\n');
        }
        render_block(block, &mut out);
    }
    out
}

fn render_block(block: &Block, out: &mut String) {
    match block {
        Block::Heading { level, text } => {
            out.push_str(&format!("<h{level}>{}</h{level}>", format_inline(text)));
        }
        Block::Paragraph { lines } => {
            out.push_str(&format!("<p>{}</p>", inline_lines(lines)));
        }
        Block::List { ordered, items } => {
            let tag = if *ordered { "ol" } else { "ul" };
            out.push_str(&format!("<{tag}>\n"));
            for item in items {
                out.push_str(&format!("<li>{}</li>\n", format_inline(item)));
            }
            out.push_str(&format!("</{tag}>"));
        }
        Block::CodeBlock { language, body } => {
            match language {
                Some(language) => out.push_str(&format!(
                    r#"<pre><code class="language-{}">"#,
                    escape_html(language)
                )),
                None => out.push_str("<pre><code>"),
            }
            out.push_str(&escape_html(body));
            out.push_str("</code></pre>");
        }
        Block::Blockquote { lines } => {
            out.push_str("<blockquote>\n");
            if !lines.is_empty() {
                out.push_str(&format!("<p>{}</p>\n", inline_lines(lines)));
            }
            out.push_str("</blockquote>");
        }
        Block::Table { header, rows } => {
            out.push_str("<table>\n<thead>\n<tr>");
            for cell in header {
                out.push_str(&format!("<th>{}</th>", format_inline(cell)));
            }
            out.push_str("</tr>\n</thead>\n");
            if !rows.is_empty() {
                out.push_str("<tbody>\n");
                for row in rows {
                    out.push_str("<tr>");
                    for cell in row {
                        out.push_str(&format!("<td>{}</td>", format_inline(cell)));
                    }
                    out.push_str("</tr>\n");
                }
                out.push_str("</tbody>\n");
            }
            out.push_str("</table>");
        }
    }
}

/// Formats each line on its own; line boundaries become `<br>`, matching the
/// full engine's treatment of soft breaks.
fn inline_lines(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| format_inline(line))
        .collect::<Vec<_>>()
        .join("<br>\n")
}
