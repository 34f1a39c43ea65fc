//! Post-render enhancer.
//!
//! Runs on an already sanitized fragment: wraps code blocks in a scrollable
//! container with a language label and copy button, and wraps tables in a
//! scrollable container. Re-running it on its own output changes nothing.

use once_cell::sync::Lazy;

use regex::Regex;

use crate::code_block::CodeBlockAnalyzer;
use crate::inline::escape_html;

const TOOLBAR_TAIL: &str = r#"<button type="button" class="copy-code">Copy</button></div>"#;
const TABLE_WRAPPER_OPEN: &str = r#"<div class="table-scroll">"#;

static PRE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<pre(?:\s[^>]*)?>(.*?)</pre>").unwrap());
static TABLE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<table(?:\s[^>]*)?>.*?</table>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Enhances a sanitized fragment. `language_hints` holds the fence language
/// of each code block in document order; missing hints are detected from
/// the code itself.
pub fn enhance_fragment(html: &str, language_hints: &[Option<String>]) -> String {
    let with_code = wrap_code_blocks(html, language_hints);
    wrap_tables(&with_code)
}

fn wrap_code_blocks(html: &str, language_hints: &[Option<String>]) -> String {
    let mut out = String::with_capacity(html.len() + 256);
    let mut last = 0;

    for (index, caps) in PRE_BLOCK_RE.captures_iter(html).enumerate() {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&html[last..whole.start()]);
        last = whole.end();

        if html[..whole.start()].ends_with(TOOLBAR_TAIL) {
            out.push_str(whole.as_str());
            continue;
        }

        let language = match language_hints.get(index) {
            Some(Some(hint)) => hint.clone(),
            _ => {
                let code = TAG_RE.replace_all(inner.as_str(), "");
                CodeBlockAnalyzer::detect_language(&html_escape::decode_html_entities(&code))
            }
        };
        let label = escape_html(&language);
        out.push_str(&format!(
            r#"<div class="code-block" data-language="{label}"><div class="code-toolbar"><span class="code-language">{label}</span>{TOOLBAR_TAIL}{}</div>"#,
            whole.as_str()
        ));
    }

    out.push_str(&html[last..]);
    out
}

fn wrap_tables(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + 64);
    let mut last = 0;

    for table in TABLE_BLOCK_RE.find_iter(html) {
        out.push_str(&html[last..table.start()]);
        last = table.end();
        if html[..table.start()].ends_with(TABLE_WRAPPER_OPEN) {
            out.push_str(table.as_str());
        } else {
            out.push_str(TABLE_WRAPPER_OPEN);
            out.push_str(table.as_str());
            out.push_str("</div>");
        }
    }

    out.push_str(&html[last..]);
    out
}
