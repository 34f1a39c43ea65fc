//! Model-Text Normalizer
//!
//! Models sometimes answer with HTML even when asked for Markdown. This pass
//! rewrites those artifacts back into Markdown so that nothing downstream
//! ever sees a tag. Fenced code blocks and inline code spans are stashed
//! before the rules run and restored afterwards, untouched.

use once_cell::sync::Lazy;

use regex::{Captures, Regex};

const STASH_OPEN: char = '\u{E000}';
const STASH_CLOSE: char = '\u{E001}';

static REASONING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<reasoning>.*?</reasoning>").unwrap());
static INLINE_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`\n]+`").unwrap());
static STASHED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}([0-9]+)\u{E001}").unwrap());
static PRE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<pre(?:\s[^>]*)?>(.*?)</pre\s*>").unwrap());
static PRE_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<pre(?:\s[^>]*)?>").unwrap());
static PRE_CLOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</pre\s*>").unwrap());
static PRE_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*<code((?:\s[^>]*)?)>(.*?)</code\s*>\s*$").unwrap()
});
static LANGUAGE_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"language-([A-Za-z0-9_+#-]+)").unwrap());
static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#).unwrap()
});
static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<h([1-4])(?:\s[^>]*)?>(.*?)</h[1-4]\s*>").unwrap());
static ANY_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?[a-z][a-z0-9-]*(?:\s[^>]*)?/?>").unwrap());
static EXCESS_NEWLINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Line-break and block-closer rules, applied right after anchors.
static BREAK_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    compile(&[
        (r"(?i)<br\s*/?>", "\n"),
        (r"(?i)</p\s*>", "\n\n"),
        (r"(?i)<p(?:\s[^>]*)?>", ""),
        (r"(?i)</div\s*>", "\n"),
        (r"(?i)<div(?:\s[^>]*)?>", ""),
    ])
});

/// Emphasis rules. Bold must stay ahead of italic.
static SPAN_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    compile(&[
        (r"(?is)<(?:strong|b)(?:\s[^>]*)?>(.*?)</(?:strong|b)\s*>", "**"),
        (r"(?is)<(?:em|i)(?:\s[^>]*)?>(.*?)</(?:em|i)\s*>", "*"),
        (r"(?is)<code(?:\s[^>]*)?>(.*?)</code\s*>", "`"),
    ])
});

/// List rules followed by the catch-all tag and comment removal.
static LIST_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    compile(&[
        (r"(?i)\s*<li(?:\s[^>]*)?>", "\n- "),
        (r"(?i)</li\s*>", ""),
        (r"(?i)</?(?:ul|ol)(?:\s[^>]*)?>", "\n"),
        (r"(?s)<!--.*?-->", ""),
    ])
});

fn compile(rules: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    rules
        .iter()
        .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), *replacement))
        .collect()
}

/// Normalizes raw model output into Markdown.
///
/// Never fails: malformed HTML at worst yields imperfect formatting, and
/// alphanumeric text is never dropped.
pub fn normalize_model_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let decoded = html_escape::decode_html_entities(raw).replace("\r\n", "\n");
    let unwrapped = strip_triple_quotes(&decoded);

    let mut stash = Vec::new();
    let protected = stash_code(unwrapped, &mut stash);
    let preformatted = PRE_RE.replace_all(&protected, |caps: &Captures| {
        let fence = preformatted_to_fence(&caps[1], &stash);
        let placeholder = stash_entry(&mut stash, fence);
        format!("\n\n{placeholder}\n\n")
    });

    let rewritten = rewrite_tags(&preformatted);
    let collapsed = EXCESS_NEWLINES_RE.replace_all(&rewritten, "\n\n");

    restore_code(&collapsed, &stash).trim().to_string()
}

/// Removes `<reasoning>` blocks some models prepend to their answer.
pub fn strip_reasoning(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    REASONING_RE.replace_all(text, "").trim().to_string()
}

fn strip_triple_quotes(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.len() >= 6 && trimmed.starts_with("\"\"\"") && trimmed.ends_with("\"\"\"") {
        &trimmed[3..trimmed.len() - 3]
    } else {
        text
    }
}

fn rewrite_tags(text: &str) -> String {
    let mut text = ANCHOR_RE
        .replace_all(text, |caps: &Captures| {
            let href = caps[1].trim();
            let label = ANY_TAG_RE.replace_all(&caps[2], "");
            let label = label.trim();
            if label.is_empty() {
                format!("[{href}]({href})")
            } else {
                format!("[{label}]({href})")
            }
        })
        .into_owned();

    for (re, replacement) in BREAK_RULES.iter() {
        text = re.replace_all(&text, *replacement).into_owned();
    }

    for (re, marker) in SPAN_RULES.iter() {
        text = re
            .replace_all(&text, |caps: &Captures| {
                let content = &caps[1];
                if content.trim().is_empty() {
                    content.to_string()
                } else {
                    format!("{marker}{content}{marker}")
                }
            })
            .into_owned();
    }

    text = HEADING_RE
        .replace_all(&text, |caps: &Captures| {
            let level: usize = caps[1].parse().unwrap_or(1);
            let title = caps[2].split_whitespace().collect::<Vec<_>>().join(" ");
            format!("\n{} {}\n\n", "#".repeat(level), title)
        })
        .into_owned();

    for (re, replacement) in LIST_RULES.iter() {
        text = re.replace_all(&text, *replacement).into_owned();
    }

    ANY_TAG_RE.replace_all(&text, "").into_owned()
}

/// Turns a `<pre>` body into a fenced block. Inline code stashed inside the
/// body is restored here, after tag stripping, so the fence holds plain text.
fn preformatted_to_fence(body: &str, stash: &[String]) -> String {
    let (language, content) = match PRE_CODE_RE.captures(body) {
        Some(caps) => {
            let language = LANGUAGE_CLASS_RE
                .captures(&caps[1])
                .map(|lang| lang[1].to_string())
                .unwrap_or_default();
            (language, caps[2].to_string())
        }
        None => (String::new(), body.to_string()),
    };
    let content = ANY_TAG_RE.replace_all(&content, "");
    let content = restore_code(&content, stash);
    let content = content.trim_matches('\n');
    let fence = "`".repeat(longest_leading_backticks(content).max(2) + 1);
    format!("{fence}{language}\n{content}\n{fence}")
}

/// Longest backtick run that opens a line, so an enclosing fence can be
/// made longer than anything inside it.
fn longest_leading_backticks(content: &str) -> usize {
    content
        .lines()
        .map(|line| line.trim_start().chars().take_while(|&c| c == '`').count())
        .max()
        .unwrap_or(0)
}

fn stash_entry(stash: &mut Vec<String>, code: String) -> String {
    stash.push(code);
    format!("{STASH_OPEN}{}{STASH_CLOSE}", stash.len() - 1)
}

/// Replaces fenced code blocks and inline code spans with placeholders.
/// Backtick lines inside an open `<pre>` element are content, not fences.
fn stash_code(text: &str, stash: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(text.len());
    // Open fence: its backtick width and the lines so far.
    let mut fence: Option<(usize, String)> = None;
    let mut in_pre = false;

    for line in text.split_inclusive('\n') {
        let (run, rest) = backtick_run(line);
        match fence.as_mut() {
            Some((width, block)) => {
                block.push_str(line);
                if run >= *width && rest.trim().is_empty() {
                    let (_, block) = fence.take().unwrap_or_default();
                    let newline = if block.ends_with('\n') { "\n" } else { "" };
                    let placeholder =
                        stash_entry(stash, block.trim_end_matches('\n').to_string());
                    out.push_str(&placeholder);
                    out.push_str(newline);
                }
            }
            None if run >= 3 && !in_pre => fence = Some((run, line.to_string())),
            None => {
                let line = INLINE_CODE_RE
                    .replace_all(line, |caps: &Captures| stash_entry(stash, caps[0].to_string()));
                in_pre = pre_open_after(&line, in_pre);
                out.push_str(&line);
            }
        }
    }

    // An unterminated fence runs to the end of input.
    if let Some((_, block)) = fence {
        out.push_str(&stash_entry(stash, block));
    }
    out
}

fn backtick_run(line: &str) -> (usize, &str) {
    let trimmed = line.trim_start();
    let rest = trimmed.trim_start_matches('`');
    (trimmed.len() - rest.len(), rest)
}

/// Whether a `<pre>` element is still open at the end of `line`.
fn pre_open_after(line: &str, was_open: bool) -> bool {
    let last_open = PRE_OPEN_RE.find_iter(line).last().map(|m| m.start());
    let last_close = PRE_CLOSE_RE.find_iter(line).last().map(|m| m.start());
    match (last_open, last_close) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => was_open,
    }
}

fn restore_code(text: &str, stash: &[String]) -> String {
    STASHED_RE
        .replace_all(text, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| stash.get(index))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize_model_text(""), "");
        assert_eq!(normalize_model_text("   \n\n  "), "");
    }

    #[test]
    fn strong_and_break_become_markdown() {
        assert_eq!(normalize_model_text("<strong>Hi</strong><br>there"), "**Hi**\nthere");
    }

    #[test]
    fn bold_is_not_reinterpreted_as_italic() {
        let out = normalize_model_text("<b>bold</b> and <em>soft</em>");
        assert_eq!(out, "**bold** and *soft*");
    }

    #[test]
    fn entities_are_decoded_before_tag_rules() {
        let out = normalize_model_text("&lt;strong&gt;loud&lt;/strong&gt; &amp; clear");
        assert_eq!(out, "**loud** & clear");
    }

    #[test]
    fn triple_quote_wrapping_is_removed_once() {
        assert_eq!(normalize_model_text("\"\"\"hello\"\"\""), "hello");
        assert_eq!(normalize_model_text("\"\"\"\"\"\"inner\"\"\"\"\"\""), "\"\"\"inner\"\"\"");
    }

    #[test]
    fn anchors_become_links() {
        let out = normalize_model_text(r#"See <a href="https://example.com" target="_blank">the docs</a>."#);
        assert_eq!(out, "See [the docs](https://example.com).");
    }

    #[test]
    fn headings_and_lists_are_rewritten() {
        let out = normalize_model_text("<h2>Plan</h2><ul>\n<li>one</li>\n<li>two</li>\n</ul>");
        assert_eq!(out, "## Plan\n\n- one\n- two");
    }

    #[test]
    fn paragraphs_become_blank_line_separated() {
        let out = normalize_model_text("<p>first</p><p>second</p>");
        assert_eq!(out, "first\n\nsecond");
    }

    #[test]
    fn unknown_tags_are_removed_but_text_kept() {
        let out = normalize_model_text("<span class=\"x\">kept</span><script>alert(1)</script>");
        assert!(!out.contains('<'));
        assert!(out.contains("kept"));
    }

    #[test]
    fn comparison_operators_survive() {
        assert_eq!(normalize_model_text("if a < b and b > c"), "if a < b and b > c");
    }

    #[test]
    fn fenced_code_is_left_verbatim() {
        let raw = "Example:\n\n```html\n<div><b>x</b></div>\n\n\n\n```\nafter <b>y</b>";
        let out = normalize_model_text(raw);
        assert!(out.contains("```html\n<div><b>x</b></div>\n\n\n\n```"));
        assert!(out.ends_with("after **y**"));
    }

    #[test]
    fn inline_code_spans_are_left_verbatim() {
        let out = normalize_model_text("use `<br>` for <i>breaks</i>");
        assert_eq!(out, "use `<br>` for *breaks*");
    }

    #[test]
    fn pre_blocks_become_fences() {
        let out = normalize_model_text(
            "<pre><code class=\"language-rust\">fn main() {}\n</code></pre>",
        );
        assert_eq!(out, "```rust\nfn main() {}\n```");
    }

    #[test]
    fn inline_code_inside_pre_is_kept() {
        assert_eq!(normalize_model_text("<pre>let `x` = 1</pre>"), "```\nlet `x` = 1\n```");
    }

    #[test]
    fn backtick_line_inside_pre_does_not_swallow_the_rest() {
        let out = normalize_model_text("<pre>\n```\ncode\n</pre>\nafter <b>x</b>");
        assert_eq!(out, "````\n```\ncode\n````\n\nafter **x**");
    }

    #[test]
    fn no_placeholder_characters_leak() {
        let out = normalize_model_text("<pre>a `b` <i>c</i></pre> and `d` <pre>`e`</pre>");
        assert!(!out.contains(STASH_OPEN) && !out.contains(STASH_CLOSE), "{out:?}");
        for word in ["a", "`b`", "c", "`d`", "`e`"] {
            assert!(out.contains(word), "{word} missing from {out:?}");
        }
    }

    #[test]
    fn excess_newlines_collapse_to_one_blank_line() {
        assert_eq!(normalize_model_text("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn reasoning_blocks_are_stripped() {
        let text = "<reasoning>we need to\nthink</reasoning>\n  The answer is 4.  ";
        assert_eq!(strip_reasoning(text), "The answer is 4.");
        assert_eq!(strip_reasoning(""), "");
    }
}
