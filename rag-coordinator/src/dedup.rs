//! Total dedup of a coordinator result set by `(id)`, `(parent_chunk_id)`,
//! and a content signature, first occurrence wins (spec §4.3 step 6,
//! invariant `distinct(R.id) == R` in spec §8).

use std::collections::HashSet;

use rag_core::model::SearchResult;

/// A normalized content signature: lowercased, whitespace-collapsed. Two
/// results with materially identical content dedup together even if their
/// ids differ (e.g. the same chunk surfaced via both vector and history
/// recall).
fn content_signature(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Removes duplicates from `results`, keeping the first occurrence of each
/// `id`, each non-empty `parent_chunk_id`, and each content signature.
#[must_use]
pub fn dedup(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen_ids = HashSet::new();
    let mut seen_parents = HashSet::new();
    let mut seen_signatures = HashSet::new();
    let mut out = Vec::with_capacity(results.len());

    for result in results {
        if !seen_ids.insert(result.id.clone()) {
            continue;
        }
        if let Some(parent) = result.parent_chunk_id.as_ref() {
            if !seen_parents.insert(parent.clone()) {
                continue;
            }
        }
        if !seen_signatures.insert(content_signature(&result.content)) {
            continue;
        }
        out.push(result);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::dedup;
    use rag_core::model::{ChunkType, MatchType, SearchResult};
    use std::collections::HashMap;

    fn result(id: &str, parent: Option<&str>, content: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            content: content.to_string(),
            score: 0.5,
            knowledge_id: "k1".into(),
            knowledge_title: "Doc".into(),
            chunk_index: 0,
            start_at: 0,
            end_at: content.chars().count() as i64,
            seq: 0,
            match_type: MatchType::Vector,
            sub_chunk_id: vec![],
            chunk_type: ChunkType::Text,
            parent_chunk_id: parent.map(str::to_string),
            image_info: serde_json::Value::Null,
            metadata: HashMap::new(),
            chunk_metadata: vec![],
        }
    }

    #[test]
    fn drops_exact_id_duplicates() {
        let out = dedup(vec![result("r1", None, "a"), result("r1", None, "b")]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn drops_shared_parent_chunk() {
        let out = dedup(vec![result("r1", Some("p1"), "a"), result("r2", Some("p1"), "b")]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn drops_matching_content_signature_regardless_of_whitespace_case() {
        let out = dedup(vec![result("r1", None, "Rotate Kubelet Certs"), result("r2", None, "rotate   kubelet certs")]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn keeps_distinct_results() {
        let out = dedup(vec![result("r1", None, "a"), result("r2", None, "b")]);
        assert_eq!(out.len(), 2);
    }
}
