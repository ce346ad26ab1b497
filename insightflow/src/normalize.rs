//! Whitespace normalization for extracted text.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::NormalizedDocument;

static NEWLINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n+").expect("newline pattern is valid"));
static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Collapses runs of newlines to one newline, then any whitespace run to a
/// single space, then trims.
///
/// Pure and idempotent. The output never contains two consecutive spaces or
/// two consecutive newlines.
#[must_use]
pub fn normalize(raw: &str) -> NormalizedDocument {
    let text = NEWLINE_RUNS.replace_all(raw, "\n");
    let text = WHITESPACE_RUNS.replace_all(&text, " ");
    NormalizedDocument::from_normalized(text.trim().to_string())
}

/// Applies the character budget, then normalizes.
///
/// The budget is applied once, right after extraction, so keywords and
/// summary see the same text.
#[must_use]
pub fn normalize_capped(raw: &str, max_chars: usize) -> NormalizedDocument {
    normalize(truncate_chars(raw, max_chars))
}

/// Returns the longest prefix of `text` with at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_canonical(text: &str) {
        assert!(!text.contains("  "), "double space in {text:?}");
        assert!(!text.contains("\n\n"), "double newline in {text:?}");
        assert_eq!(text, text.trim());
    }

    #[test]
    fn test_collapses_whitespace() {
        let doc = normalize("  Hello,\n\n\n   world!\t\tHow   are\r\nyou?  ");
        assert_eq!(doc.as_str(), "Hello, world! How are you?");
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert_eq!(normalize("").as_str(), "");
        assert_eq!(normalize(" \n \t\n").as_str(), "");
        assert!(normalize("\n\n").is_empty());
    }

    #[test]
    fn test_unicode_whitespace() {
        let doc = normalize("caf\u{e9}\u{a0}\u{a0}au\u{2003}lait");
        assert_eq!(doc.as_str(), "caf\u{e9} au lait");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "",
            "plain",
            "  a\n\nb  c \n",
            "\t\tx\r\n\r\ny\u{2028}z",
            "already normal text.",
        ];
        for input in inputs {
            let once = normalize(input);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice);
            assert_canonical(once.as_str());
        }
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_normalize_capped() {
        let raw = "word ".repeat(2000);
        let doc = normalize_capped(&raw, 5000);
        assert!(doc.char_count() <= 5000);
        assert_canonical(doc.as_str());
    }
}
