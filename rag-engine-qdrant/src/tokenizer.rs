//! Query tokenization for the client-side keyword emulation (spec §4.2):
//! Jieba search-mode segmentation for CJK text (dropping tokens shorter
//! than 2 runes and deduplicating), falling back to whitespace splitting
//! for scripts Jieba doesn't help with (spec §9 "a target rewrite should
//! use an equivalent segmenter for CJK, falling back to whitespace
//! splitting otherwise").

use std::sync::OnceLock;

use jieba_rs::Jieba;

fn jieba() -> &'static Jieba {
    static JIEBA: OnceLock<Jieba> = OnceLock::new();
    JIEBA.get_or_init(Jieba::new)
}

/// True once any character in `text` falls in a CJK Unicode block, the
/// heuristic used to decide whether Jieba segmentation applies at all.
fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c as u32,
            0x4E00..=0x9FFF   // CJK Unified Ideographs
            | 0x3040..=0x30FF // Hiragana + Katakana
            | 0xAC00..=0xD7A3 // Hangul syllables
        )
    })
}

/// Tokenizes `query` for the should-match keyword emulation: Jieba
/// search-mode segmentation when CJK is detected, whitespace splitting
/// otherwise; tokens under 2 runes are dropped and duplicates removed,
/// first occurrence wins.
#[must_use]
pub fn tokenize_for_search(query: &str) -> Vec<String> {
    let raw: Vec<String> = if contains_cjk(query) {
        jieba().cut_for_search(query, true).into_iter().map(str::to_string).collect()
    } else {
        query.split_whitespace().map(str::to_string).collect()
    };

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for token in raw {
        let trimmed = token.trim().to_lowercase();
        if trimmed.chars().count() < 2 {
            continue;
        }
        if seen.insert(trimmed.clone()) {
            out.push(trimmed);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::tokenize_for_search;

    #[test]
    fn whitespace_path_for_latin_text() {
        let tokens = tokenize_for_search("how to rotate kubelet certs");
        assert_eq!(tokens, vec!["how", "to", "rotate", "kubelet", "certs"]);
    }

    #[test]
    fn drops_single_rune_tokens() {
        let tokens = tokenize_for_search("a an the rotate certs");
        assert!(!tokens.contains(&"a".to_string()));
        assert!(tokens.contains(&"rotate".to_string()));
    }

    #[test]
    fn deduplicates_tokens() {
        let tokens = tokenize_for_search("certs certs rotate");
        assert_eq!(tokens.iter().filter(|t| *t == "certs").count(), 1);
    }

    #[test]
    fn cjk_text_is_segmented_not_split_on_whitespace() {
        let tokens = tokenize_for_search("如何轮换kubelet证书");
        assert!(!tokens.is_empty());
    }
}
