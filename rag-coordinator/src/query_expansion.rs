//! Local query-variant generation for the coordinator's expansion fan-out
//! (spec §4.3 step 4): stopword removal, phrase extraction, delimiter
//! splitting, and question-word stripping, capped at 5 variants and run
//! keyword-only against a lowered threshold.

use unicode_segmentation::UnicodeSegmentation;

const MAX_VARIANTS: usize = 5;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "to", "of", "in", "on", "at", "for", "with",
    "and", "or", "but", "that", "this", "these", "those", "it", "as", "by", "from", "about",
];

const QUESTION_PREFIXES: &[&str] =
    &["what is", "what are", "how do", "how does", "how to", "why is", "why does", "when did", "when does", "where is", "who is", "which", "can you", "could you", "does", "do"];

const DELIMITERS: &[char] = &[',', ';', '/', '|'];

fn words(text: &str) -> Vec<&str> {
    text.unicode_words().collect()
}

/// Removes stopwords, collapsing whitespace. Empty if the query is only
/// stopwords.
fn strip_stopwords(query: &str) -> Option<String> {
    let kept: Vec<&str> = words(query).into_iter().filter(|w| !STOPWORDS.contains(&w.to_lowercase().as_str())).collect();
    if kept.is_empty() || kept.len() == words(query).len() {
        return None;
    }
    Some(kept.join(" "))
}

/// Strips a leading question-word/phrase ("what is", "how do", ...), case
/// insensitively, leaving the remainder.
fn strip_question_words(query: &str) -> Option<String> {
    let lower = query.to_lowercase();
    for prefix in QUESTION_PREFIXES {
        if let Some(rest) = lower.strip_prefix(prefix) {
            let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '?');
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    None
}

/// Splits on common delimiters (",", ";", "/", "|") into non-trivial
/// sub-queries, dropping fragments under two words.
fn delimiter_splits(query: &str) -> Vec<String> {
    query
        .split(DELIMITERS)
        .map(str::trim)
        .filter(|part| words(part).len() >= 2)
        .map(str::to_string)
        .collect()
}

/// Extracts contiguous runs of non-stopword tokens of length ≥ 2 as
/// candidate noun phrases, the closest approximation to "phrase extraction"
/// available without a full NLP stack.
fn phrase_extraction(query: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for word in words(query) {
        if STOPWORDS.contains(&word.to_lowercase().as_str()) {
            if current.len() >= 2 {
                phrases.push(current.join(" "));
            }
            current.clear();
        } else {
            current.push(word);
        }
    }
    if current.len() >= 2 {
        phrases.push(current.join(" "));
    }
    phrases
}

/// Generates up to [`MAX_VARIANTS`] distinct, non-empty rewrites of `query`,
/// in priority order: question-word stripping, stopword removal, delimiter
/// splits, then extracted phrases. The original query is never included.
#[must_use]
pub fn expand(query: &str) -> Vec<String> {
    let mut variants = Vec::new();
    let mut seen = std::collections::HashSet::new();
    seen.insert(query.to_lowercase());

    let mut push = |candidate: String, variants: &mut Vec<String>| {
        let key = candidate.to_lowercase();
        if !candidate.trim().is_empty() && seen.insert(key) {
            variants.push(candidate);
        }
    };

    if let Some(v) = strip_question_words(query) {
        push(v, &mut variants);
    }
    if let Some(v) = strip_stopwords(query) {
        push(v, &mut variants);
    }
    for v in delimiter_splits(query) {
        push(v, &mut variants);
    }
    for v in phrase_extraction(query) {
        push(v, &mut variants);
    }

    variants.truncate(MAX_VARIANTS);
    variants
}

#[cfg(test)]
mod tests {
    use super::expand;

    #[test]
    fn strips_question_prefix() {
        let variants = expand("How do I rotate kubelet certs");
        assert!(variants.iter().any(|v| v.eq_ignore_ascii_case("I rotate kubelet certs")));
    }

    #[test]
    fn splits_on_delimiters() {
        let variants = expand("kubelet certs, tls rotation, bootstrap tokens");
        assert!(variants.iter().any(|v| v == "tls rotation"));
        assert!(variants.iter().any(|v| v == "bootstrap tokens"));
    }

    #[test]
    fn never_exceeds_five_variants_or_repeats_original() {
        let variants = expand("what is the the the best way to rotate, renew, refresh kubelet certs");
        assert!(variants.len() <= 5);
        assert!(!variants.iter().any(|v| v.eq_ignore_ascii_case("what is the the the best way to rotate, renew, refresh kubelet certs")));
    }

    #[test]
    fn all_stopwords_yields_no_variant() {
        let variants = expand("the a an");
        assert!(variants.is_empty());
    }
}
