//! Input sanitising helpers.

use regex::Regex;
use std::sync::LazyLock;

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("invalid tag pattern"));

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("invalid whitespace pattern"));

/// Cleans a single-line text field.
///
/// Strips markup tags and control characters, collapses whitespace runs
/// and trims the result.
pub fn sanitize_text_field(input: &str) -> String {
    let without_tags = TAG_REGEX.replace_all(input, "");
    let printable: String = without_tags
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    WHITESPACE_REGEX
        .replace_all(&printable, " ")
        .trim()
        .to_string()
}

/// Truncates to at most `max` characters on a char boundary.
pub fn truncate_chars(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}
