//! Credential redaction for probe errors and diagnostics
//!
//! Endpoint headers embed the provider credential and vendor error bodies
//! sometimes echo it back, so every error string that ends up on an
//! [`Endpoint`](crate::models::Endpoint) or in a log line passes through here.

use once_cell::sync::Lazy;
use regex::Regex;

/// Header names whose values are always secret
const SECRET_HEADERS: &[&str] = &[
    "authorization",
    "x-api-key",
    "api-key",
    "xi-api-key",
    "x-goog-api-key",
];

struct RedactionRule {
    regex: Regex,
    replacement: &'static str,
}

static RULES: Lazy<Vec<RedactionRule>> = Lazy::new(|| {
    [
        // Anthropic keys first so the generic sk- rule does not eat the prefix
        (r"sk-ant-[A-Za-z0-9_\-]{16,}", "[REDACTED_ANTHROPIC_KEY]"),
        (r"sk-[A-Za-z0-9_\-]{16,}", "[REDACTED_KEY]"),
        (r"gsk_[A-Za-z0-9]{16,}", "[REDACTED_KEY]"),
        (
            r"(?i)(x-api-key|xi-api-key|api-key|authorization)(\s*[:=]\s*)(?:bearer\s+)?[^\s,;]+",
            "$1$2[REDACTED]",
        ),
        (r"(?i)bearer\s+[A-Za-z0-9._\-/+=]+", "Bearer [REDACTED]"),
        (
            r"(?i)(api[_-]?key|token|secret|password)=[^\s&,;]+",
            "$1=[REDACTED]",
        ),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| {
        Regex::new(pattern)
            .ok()
            .map(|regex| RedactionRule { regex, replacement })
    })
    .collect()
});

/// Replace anything that looks like a credential in `input`
pub fn redact(input: &str) -> String {
    RULES.iter().fold(input.to_string(), |acc, rule| {
        rule.regex.replace_all(&acc, rule.replacement).into_owned()
    })
}

/// Whether `input` contains something that looks like a credential
pub fn contains_sensitive_info(input: &str) -> bool {
    RULES.iter().any(|rule| rule.regex.is_match(input))
}

/// Whether the value of header `name` must never be printed
pub fn is_secret_header(name: &str) -> bool {
    SECRET_HEADERS
        .iter()
        .any(|secret| secret.eq_ignore_ascii_case(name))
}

/// Header value as it may appear in debug output
pub fn display_header_value<'a>(name: &str, value: &'a str) -> std::borrow::Cow<'a, str> {
    if is_secret_header(name) {
        std::borrow::Cow::Borrowed("[REDACTED]")
    } else {
        std::borrow::Cow::Owned(redact(value))
    }
}

/// A wrapper whose `Debug` and `Display` output is redacted
pub struct Redacted<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", redact(self.0.as_ref()))
    }
}

impl<T: AsRef<str>> std::fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", redact(self.0.as_ref()))
    }
}
