//! Allow-list HTML sanitizer.
//!
//! Every fragment that leaves the pipeline passes through here, whatever
//! parser produced it. Disallowed tags are unwrapped (their text kept),
//! except `script` and `style`, which are removed with their content.

use std::collections::{HashMap, HashSet};

use ammonia::{Builder, UrlRelative};

pub const ALLOWED_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "br", "strong", "em", "ul", "ol", "li", "code", "pre",
    "blockquote", "table", "thead", "tbody", "tr", "th", "td", "a",
];

/// Attributes permitted on `a`. No other element keeps any attribute.
pub const ANCHOR_ATTRIBUTES: &[&str] = &["href", "target", "rel"];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];
const REMOVED_WITH_CONTENT: &[&str] = &["script", "style"];

fn policy() -> Builder<'static> {
    let mut builder = Builder::empty();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .tag_attributes(HashMap::from([(
            "a",
            ANCHOR_ATTRIBUTES.iter().copied().collect::<HashSet<_>>(),
        )]))
        .url_schemes(URL_SCHEMES.iter().copied().collect())
        .url_relative(UrlRelative::PassThrough)
        .clean_content_tags(REMOVED_WITH_CONTENT.iter().copied().collect())
        .link_rel(None)
        .strip_comments(true);
    builder
}

/// Filters an HTML fragment down to the allow-list.
pub fn sanitize_fragment(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    policy().clean(html).to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use once_cell::sync::Lazy;

    use regex::Regex;

    use super::*;

    static TAG_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"<\s*/?\s*([A-Za-z][A-Za-z0-9]*)([^>]*)>").unwrap());
    static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"\s([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).unwrap()
    });

    /// Panics if `html` carries any tag or attribute outside the allow-list.
    pub(crate) fn assert_allow_listed(html: &str) {
        for caps in TAG_RE.captures_iter(html) {
            let tag = caps[1].to_ascii_lowercase();
            assert!(ALLOWED_TAGS.contains(&tag.as_str()), "disallowed tag <{tag}> in {html}");
            for attr in ATTR_RE.captures_iter(&caps[2]) {
                let name = attr[1].to_ascii_lowercase();
                assert!(
                    tag == "a" && ANCHOR_ATTRIBUTES.contains(&name.as_str()),
                    "disallowed attribute {name} on <{tag}> in {html}"
                );
            }
        }
    }

    #[test]
    fn script_is_removed_with_content() {
        let clean = sanitize_fragment("<p>hi</p><script>alert(1)</script>");
        assert_eq!(clean, "<p>hi</p>");
    }

    #[test]
    fn disallowed_tags_are_unwrapped() {
        let clean = sanitize_fragment(r#"<div onclick="x()"><span>text</span><img src="a.png"></div>"#);
        assert_eq!(clean, "text");
    }

    #[test]
    fn anchor_keeps_only_allowed_attributes() {
        let clean = sanitize_fragment(
            r#"<a href="https://example.com" target="_blank" rel="noopener noreferrer" onclick="x()" class="c">go</a>"#,
        );
        assert_eq!(
            clean,
            r#"<a href="https://example.com" target="_blank" rel="noopener noreferrer">go</a>"#
        );
    }

    #[test]
    fn javascript_urls_are_dropped() {
        let clean = sanitize_fragment(r#"<a href="javascript:alert(1)">x</a>"#);
        assert!(!clean.contains("javascript"));
        assert!(clean.contains(">x</a>"));
    }

    #[test]
    fn attributes_on_other_tags_are_removed() {
        let clean = sanitize_fragment(r#"<pre><code class="language-rust">fn x() {}</code></pre>"#);
        assert_eq!(clean, "<pre><code>fn x() {}</code></pre>");
    }

    #[test]
    fn escaped_text_is_not_double_escaped() {
        assert_eq!(sanitize_fragment("<p>Tom &amp; Jerry</p>"), "<p>Tom &amp; Jerry</p>");
    }

    #[test]
    fn adversarial_inputs_stay_allow_listed() {
        let inputs = [
            "<script>alert(1)</script>",
            "<img src=x onerror=alert(1)>",
            "<iframe src=\"https://evil\"></iframe>",
            "<a href=\"#\" style=\"color:red\" data-x=\"1\">a</a>",
            "<table><tr><td style=\"x\">1</td></tr></table>",
            "<!-- comment --><style>p{}</style><p>ok</p>",
        ];
        for input in inputs {
            let clean = sanitize_fragment(input);
            assert_allow_listed(&clean);
            assert!(!clean.contains("alert"), "{clean}");
        }
    }

    #[test]
    fn empty_fragment_stays_empty() {
        assert_eq!(sanitize_fragment(""), "");
    }
}
