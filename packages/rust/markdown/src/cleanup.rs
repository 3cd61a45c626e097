//! Plain-text cleanup passes.
//!
//! Each pass is a function `&str -> String` applied in sequence by the
//! public helpers in the crate root.

use std::sync::LazyLock;

use regex::Regex;

/// Marker appended when text is cut short.
pub(crate) const TRUNCATION_MARKER: &str = "...";

// ---------------------------------------------------------------------------
// Pass: collapse whitespace
// ---------------------------------------------------------------------------

/// Replace every whitespace run (including newlines) with a single space.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    WS_RE.replace_all(text.trim(), " ").to_string()
}

// ---------------------------------------------------------------------------
// Pass: clean up excessive blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of blank lines into one and trim trailing spaces per line.
pub(crate) fn clean_blank_lines(text: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let trimmed: Vec<&str> = text.lines().map(str::trim_end).collect();
    MULTI_BLANK_RE
        .replace_all(&trimmed.join("\n"), "\n\n")
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Pass: truncate
// ---------------------------------------------------------------------------

/// Cut `text` to at most `max_chars` characters, ending with [`TRUNCATION_MARKER`]
/// when anything was removed. Counts chars, not bytes.
pub(crate) fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        return TRUNCATION_MARKER.chars().take(max_chars).collect();
    }

    let kept: String = text.chars().take(max_chars - marker_len).collect();
    format!("{kept}{TRUNCATION_MARKER}")
}

/// First `max_chars` characters of `text`, with no marker.
pub(crate) fn prefix_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
