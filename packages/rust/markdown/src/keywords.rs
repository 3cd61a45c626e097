//! YAKE keyword extraction.
//!
//! Thin wrapper over `yake-rust` with the English stopword list and the
//! default configuration (n-grams up to 3, near-duplicate removal). Lower
//! YAKE scores are better; results come back best first.

use tracing::{debug, warn};
use yake_rust::{Config, StopWords, get_n_best};

/// Default number of keywords returned by callers that don't care.
pub const DEFAULT_TOP_K: usize = 10;

/// Stopword list used for README text.
const STOPWORD_LANGUAGE: &str = "en";

/// Extract up to `top_k` keywords from `text`, best first.
///
/// Returns an empty list for blank input. Results keep the casing they were
/// first seen with and are distinct case-insensitively.
pub fn extract_keywords(text: &str, top_k: usize) -> Vec<String> {
    if text.trim().is_empty() || top_k == 0 {
        return Vec::new();
    }

    let Some(stop_words) = StopWords::predefined(STOPWORD_LANGUAGE) else {
        warn!(language = STOPWORD_LANGUAGE, "no stopword list, skipping keywords");
        return Vec::new();
    };

    let ranked = get_n_best(top_k, text, &stop_words, &Config::default());

    let mut selected: Vec<String> = Vec::with_capacity(ranked.len());
    for item in ranked {
        let candidate = item.raw.trim();
        if candidate.is_empty() || selected.iter().any(|s| s.eq_ignore_ascii_case(candidate)) {
            continue;
        }
        selected.push(candidate.to_string());
    }

    debug!(count = selected.len(), "keywords ranked");
    selected
}
