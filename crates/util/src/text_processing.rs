//! # Text Processing Utilities
//!
//! Redaction of credentials before they reach log lines, plus the small text
//! transforms used when presenting commands (labels, docstring dedent).

use cmdbridge_types::{ArgValue, CoercedArguments};
use once_cell::sync::Lazy;
use regex::Regex;

const REDACTED: &str = "[REDACTED]";

/// Redacts password values and credential lists in a string.
///
/// Key names are kept so the line is still useful for debugging.
///
/// # Example
/// ```rust
/// use cmdbridge_util::text_processing::redact_sensitive;
///
/// let redacted = redact_sensitive("'password'='hunter2', timeout=120");
/// assert_eq!(redacted, "'password'=[REDACTED], timeout=120");
///
/// let redacted = redact_sensitive("<password>hunter2</password>");
/// assert_eq!(redacted, "<password>[REDACTED]</password>");
/// ```
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();

    for pattern in get_redact_patterns().iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                let suffix = captures.get(3).map(|m| m.as_str()).unwrap_or("");
                format!("{prefix}{REDACTED}{suffix}")
            })
            .to_string();
    }

    redacted
}

/// Returns compiled redaction patterns.
///
/// Each pattern captures the key in group 1, the secret in group 2 and an
/// optional closing delimiter in group 3.
fn get_redact_patterns() -> &'static Vec<Regex> {
    static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(build_redact_patterns);

    &REDACT_PATTERNS
}

fn build_redact_patterns() -> Vec<Regex> {
    vec![
        Regex::new(r"(?i)(<password>)(.*?)(</password>)").expect("valid xml password pattern"),
        Regex::new(r#"(?i)(['"]?credentials(?:\[\])?['"]?\s*[=:,]\s*)(\[[^\]]*\]|'[^']*'|"[^"]*")()"#)
            .expect("valid credentials pattern"),
        Regex::new(r#"(?i)(['"]?[A-Za-z0-9_]*password[A-Za-z0-9_]*['"]?\s*[=:,]\s*)('[^']*'|"[^"]*"|[^\s,;)]+)()"#)
            .expect("valid password pattern"),
    ]
}

/// Human-readable label for a parameter or command name.
///
/// ```rust
/// use cmdbridge_util::label_for;
/// assert_eq!(label_for("no_check_hostname"), "no check hostname");
/// ```
pub fn label_for(name: &str) -> String {
    name.replace('_', " ")
}

/// Removes common leading indentation from a docstring and trims blank edges.
pub fn dedent_doc(doc: &str) -> String {
    textwrap::dedent(doc).trim_matches('\n').to_string()
}

/// Escapes text for embedding in an HTML fragment.
///
/// ```rust
/// use cmdbridge_util::escape_markup;
/// assert_eq!(escape_markup("<a href='x'>&</a>"), "&lt;a href=&#39;x&#39;&gt;&amp;&lt;/a&gt;");
/// ```
pub fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// One-line summary of coerced arguments suitable for debug logs.
///
/// Credentials and password-named values are masked; uploaded bytes are
/// reported by size.
pub fn summarize_arguments(arguments: &CoercedArguments) -> String {
    arguments
        .iter()
        .map(|(name, value)| {
            let rendered = if name == "credentials" || name.contains("password") {
                REDACTED.to_string()
            } else {
                match value {
                    ArgValue::Bool(flag) => flag.to_string(),
                    ArgValue::Text(text) => format!("{text:?}"),
                    ArgValue::Integer(number) => number.to_string(),
                    ArgValue::Float(number) => number.to_string(),
                    ArgValue::List(items) => format!("{items:?}"),
                    ArgValue::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
                    ArgValue::Absent => "None".to_string(),
                    ArgValue::Opaque(value) => value.to_string(),
                }
            };
            format!("{name}={rendered}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}
