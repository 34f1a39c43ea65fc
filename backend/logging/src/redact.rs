//! Log Redaction Layer
//!
//! Scrubs API keys, bearer tokens, and phone numbers from strings prior to logging.

use regex::Regex;
use once_cell::sync::Lazy;

static TELEPHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+\d{1,3}[-.\s]?)?\(?\b\d{3}\)?[-.\s]\d{3}[-.\s]\d{4}\b").unwrap()
});
static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9_-]{20,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").unwrap()
});
static KEY_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)("?(?:api[_-]?key|access[_-]?token|authorization)"?\s*[:=]\s*"?)[^"\s,}]+"#)
        .unwrap()
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = TELEPHONE_RE.replace_all(input, "[REDACTED_PHONE]");
    let redacted = API_KEY_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    KEY_FIELD_RE
        .replace_all(&redacted, "${1}[REDACTED_TOKEN]")
        .into_owned()
}
