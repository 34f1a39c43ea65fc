//! Inline-span formatting shared by every fallback block type.
//!
//! Text is escaped exactly once, then code spans, bold, italic and links are
//! applied in that order. Code span contents are never formatted further.

use once_cell::sync::Lazy;

use regex::{Captures, Regex};

static CODE_SPAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static BOLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(\S(?:.*?\S)?)\*\*|__(\S(?:.*?\S)?)__").unwrap());
static ITALIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\s](?:[^*]*[^*\s])?)\*").unwrap());
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").unwrap());

const LINK_SCHEMES: &[&str] = &["http:", "https:", "mailto:"];

/// Escapes the five HTML metacharacters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Formats inline Markdown spans into HTML.
pub fn format_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for caps in CODE_SPAN_RE.captures_iter(text) {
        let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&format_spans(&escape_html(&text[last..whole.start()])));
        out.push_str("<code>");
        out.push_str(&escape_html(code.as_str()));
        out.push_str("</code>");
        last = whole.end();
    }
    out.push_str(&format_spans(&escape_html(&text[last..])));
    out
}

fn format_spans(escaped: &str) -> String {
    let bold = BOLD_RE.replace_all(escaped, |caps: &Captures| {
        let inner = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        format!("<strong>{inner}</strong>")
    });
    let italic = ITALIC_RE.replace_all(&bold, "<em>${1}</em>");
    LINK_RE
        .replace_all(&italic, |caps: &Captures| {
            let label = &caps[1];
            let href = &caps[2];
            if is_safe_href(href) {
                format!(r#"<a href="{href}" target="_blank" rel="noopener noreferrer">{label}</a>"#)
            } else {
                label.to_string()
            }
        })
        .into_owned()
}

/// Absolute URLs must use an allowed scheme; relative URLs pass.
fn is_safe_href(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    match lower.find(':') {
        None => true,
        Some(colon) => {
            let before = &lower[..colon];
            before.contains('/') || before.contains('?') || before.contains('#')
                || LINK_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_metacharacters_once() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
        assert_eq!(format_inline("a & b"), "a &amp; b");
    }

    #[test]
    fn bold_is_matched_before_italic() {
        assert_eq!(format_inline("**bold** and *it*"), "<strong>bold</strong> and <em>it</em>");
        assert_eq!(format_inline("**a *b* c**"), "<strong>a <em>b</em> c</strong>");
        assert_eq!(format_inline("__under__"), "<strong>under</strong>");
    }

    #[test]
    fn unbalanced_markers_stay_literal() {
        assert_eq!(format_inline("2 * 3 * 4"), "2 * 3 * 4");
        assert_eq!(format_inline("**open"), "**open");
    }

    #[test]
    fn code_spans_are_not_formatted() {
        assert_eq!(format_inline("run `a **b** <c>` now"), "run <code>a **b** &lt;c&gt;</code> now");
    }

    #[test]
    fn links_open_in_new_tab() {
        assert_eq!(
            format_inline("[docs](https://example.com/a?b=1&c=2)"),
            r#"<a href="https://example.com/a?b=1&amp;c=2" target="_blank" rel="noopener noreferrer">docs</a>"#
        );
    }

    #[test]
    fn unsafe_link_schemes_render_as_text() {
        assert_eq!(format_inline("[click](javascript:alert(1))"), "click)");
        assert_eq!(format_inline("[x](data:text/html,hi)"), "x");
        assert!(format_inline("[rel](/path/a:b)").contains("href=\"/path/a:b\""));
    }
}
