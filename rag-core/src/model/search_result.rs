use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How a [`SearchResult`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Keyword,
    Vector,
    Graph,
    History,
    Web,
    DirectLoad,
}

/// The shape of the chunk a [`SearchResult`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Text,
    Summary,
    Faq,
    Web,
}

/// A candidate chunk surfaced to the pipeline by the coordinator, reranker,
/// or merge stage.
///
/// `start_at`/`end_at` are rune (Unicode scalar value) offsets, not bytes,
/// matching spec's merge/neighbor-expansion arithmetic which operates in
/// rune space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub score: f32,
    pub knowledge_id: String,
    pub knowledge_title: String,
    pub chunk_index: i64,
    pub start_at: i64,
    pub end_at: i64,
    pub seq: i64,
    pub match_type: MatchType,
    #[serde(default)]
    pub sub_chunk_id: Vec<String>,
    pub chunk_type: ChunkType,
    #[serde(default)]
    pub parent_chunk_id: Option<String>,
    #[serde(default)]
    pub image_info: serde_json::Value,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub chunk_metadata: Vec<u8>,
}

impl SearchResult {
    /// Replaces a non-finite score with `0.0`, per the ingress invariant
    /// that `score` is always finite.
    #[must_use]
    pub fn sanitized_score(score: f32) -> f32 {
        if score.is_finite() {
            score
        } else {
            0.0
        }
    }

    /// `start_at <= end_at`, the invariant every constructor site must
    /// uphold.
    #[must_use]
    pub fn span_valid(&self) -> bool {
        self.start_at <= self.end_at
    }

    /// Rune length of `content`, used throughout merge/neighbor-expansion
    /// arithmetic instead of byte length.
    #[must_use]
    pub fn rune_len(&self) -> usize {
        self.content.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::{ChunkType, MatchType, SearchResult};
    use std::collections::HashMap;

    fn sample() -> SearchResult {
        SearchResult {
            id: "r1".into(),
            content: "héllo wörld".into(),
            score: 0.42,
            knowledge_id: "k1".into(),
            knowledge_title: "Doc".into(),
            chunk_index: 0,
            start_at: 0,
            end_at: 11,
            seq: 0,
            match_type: MatchType::Vector,
            sub_chunk_id: vec![],
            chunk_type: ChunkType::Text,
            parent_chunk_id: None,
            image_info: serde_json::Value::Null,
            metadata: HashMap::new(),
            chunk_metadata: vec![],
        }
    }

    #[test]
    fn sanitizes_nan_and_inf() {
        assert_eq!(SearchResult::sanitized_score(f32::NAN), 0.0);
        assert_eq!(SearchResult::sanitized_score(f32::INFINITY), 0.0);
        assert_eq!(SearchResult::sanitized_score(0.75), 0.75);
    }

    #[test]
    fn span_and_rune_len() {
        let r = sample();
        assert!(r.span_valid());
        assert_eq!(r.rune_len(), 11);
    }
}
