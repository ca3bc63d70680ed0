//! Maximal Marginal Relevance selection (spec §4.4): greedy diversification
//! trading relevance against redundancy via lambda, over token sets computed
//! once per candidate with a simple whitespace/CJK tokenizer and Jaccard
//! similarity.

use std::collections::HashSet;

/// MMR's relevance/diversity tradeoff, fixed at the spec's value.
pub const MMR_LAMBDA: f32 = 0.7;

/// True once any character in `text` falls in a CJK Unicode block, the same
/// heuristic `rag-engine-qdrant::tokenizer` uses, without pulling in a full
/// segmenter dependency here since MMR only needs token *sets*, not
/// linguistically correct segmentation.
fn contains_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF   // CJK Unified Ideographs
        | 0x3040..=0x30FF // Hiragana + Katakana
        | 0xAC00..=0xD7A3 // Hangul syllables
    )
}

/// Splits `text` on whitespace; any whitespace-delimited token containing a
/// CJK character is further split into one token per character (CJK text
/// rarely has space-delimited word boundaries), everything else is kept
/// lowercased as a single token.
#[must_use]
pub fn tokenize(text: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    for word in text.split_whitespace() {
        if word.chars().any(contains_cjk) {
            for ch in word.chars() {
                tokens.insert(ch.to_string());
            }
        } else {
            let lowered: String = word.chars().filter(|c| c.is_alphanumeric()).collect::<String>().to_lowercase();
            if !lowered.is_empty() {
                tokens.insert(lowered);
            }
        }
    }
    tokens
}

/// Jaccard similarity: `|A ∩ B| / |A ∪ B|`, `0.0` when both sets are empty.
#[must_use]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let ratio = intersection as f32 / union as f32;
        ratio
    }
}

/// Greedy MMR selection over `relevance[i]`/`tokens[i]` (same length,
/// index-aligned with the candidate list), picking `k` indices in selection
/// order. Returns the selected indices and the average pairwise Jaccard
/// redundancy among them (the diagnostic spec §4.4 calls for), `0.0` if
/// fewer than two are selected.
#[must_use]
pub fn mmr_select(relevance: &[f32], tokens: &[HashSet<String>], k: usize, lambda: f32) -> (Vec<usize>, f32) {
    let n = relevance.len();
    let k = k.min(n);
    let mut selected: Vec<usize> = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..n).collect();

    while selected.len() < k && !remaining.is_empty() {
        let Some((best_pos, _)) = remaining
            .iter()
            .enumerate()
            .map(|(pos, &idx)| {
                let max_sim = selected.iter().map(|&s| jaccard(&tokens[idx], &tokens[s])).fold(0.0_f32, f32::max);
                let mmr_value = lambda * relevance[idx] - (1.0 - lambda) * max_sim;
                (pos, mmr_value)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        else {
            break;
        };
        selected.push(remaining.remove(best_pos));
    }

    let redundancy = average_pairwise_redundancy(&selected, tokens);
    (selected, redundancy)
}

/// Average Jaccard similarity across every unordered pair of `selected`
/// indices into `tokens`; `0.0` if fewer than two.
#[must_use]
pub fn average_pairwise_redundancy(selected: &[usize], tokens: &[HashSet<String>]) -> f32 {
    if selected.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0_f32;
    let mut pairs = 0usize;
    for i in 0..selected.len() {
        for j in (i + 1)..selected.len() {
            total += jaccard(&tokens[selected[i]], &tokens[selected[j]]);
            pairs += 1;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let avg = total / pairs.max(1) as f32;
    avg
}

#[cfg(test)]
mod tests {
    use super::{average_pairwise_redundancy, jaccard, mmr_select, tokenize, MMR_LAMBDA};
    use std::collections::HashSet;

    #[test]
    fn tokenize_lowercases_and_strips_punctuation() {
        let t = tokenize("Rotate, Kubelet Certs!");
        assert!(t.contains("rotate"));
        assert!(t.contains("kubelet"));
        assert!(t.contains("certs"));
    }

    #[test]
    fn tokenize_splits_cjk_into_characters() {
        let t = tokenize("轮换证书");
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn jaccard_of_identical_sets_is_one() {
        let a: HashSet<String> = ["a".to_string(), "b".to_string()].into_iter().collect();
        assert_eq!(jaccard(&a, &a.clone()), 1.0);
    }

    #[test]
    fn jaccard_of_disjoint_sets_is_zero() {
        let a: HashSet<String> = ["a".to_string()].into_iter().collect();
        let b: HashSet<String> = ["b".to_string()].into_iter().collect();
        assert_eq!(jaccard(&a, &b), 0.0);
    }

    #[test]
    fn mmr_with_k_ge_candidates_returns_all() {
        let relevance = vec![0.9, 0.8, 0.7];
        let tokens = vec![tokenize("a b c"), tokenize("d e f"), tokenize("g h i")];
        let (selected, _) = mmr_select(&relevance, &tokens, 10, MMR_LAMBDA);
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn mmr_diversifies_away_from_near_duplicates() {
        let relevance = vec![0.9, 0.9, 0.9, 0.1];
        let tokens = vec![
            tokenize("rotate kubelet certificates automatically"),
            tokenize("rotate kubelet certificates automatically now"),
            tokenize("rotate kubelet certificates automatically please"),
            tokenize("completely unrelated distinct content here"),
        ];
        let (selected, _) = mmr_select(&relevance, &tokens, 2, MMR_LAMBDA);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0], 0);
        assert_eq!(selected[1], 3);
    }

    #[test]
    fn redundancy_of_single_selection_is_zero() {
        let tokens = vec![tokenize("a b c")];
        assert_eq!(average_pairwise_redundancy(&[0], &tokens), 0.0);
    }
}
