//! Composite scoring + MMR diversification (spec §4.4): builds enriched
//! passages, invokes the `Reranker` collaborator with a threshold-degradation
//! retry, computes each candidate's composite score, and selects the final
//! set via MMR.

use rag_core::collaborators::{ChunkRepository, RerankScore, Reranker};
use rag_core::model::{MatchType, SearchResult};
use rag_core::AppError;

use crate::mmr::{mmr_select, tokenize, MMR_LAMBDA};
use crate::scoring::composite_score;

/// Threshold-degradation retries are capped at exactly one (Open Question
/// decision, `DESIGN.md`).
pub const RERANK_DEGRADE_RETRIES: u32 = 1;

/// `knowledge_source` label the composite formula checks for the web-search
/// discount; non-web results may carry an explicit override in
/// `SearchResult.metadata`, otherwise `match_type=web` implies it directly.
pub const KNOWLEDGE_SOURCE_KEY: &str = "knowledge_source";
pub const WEB_SEARCH_SOURCE: &str = "web_search";

fn knowledge_source_of(result: &SearchResult) -> String {
    if matches!(result.match_type, MatchType::Web) {
        WEB_SEARCH_SOURCE.to_string()
    } else {
        result.metadata.get(KNOWLEDGE_SOURCE_KEY).cloned().unwrap_or_default()
    }
}

/// Enriches a candidate's content with image captions/OCR text (parsed from
/// `image_info`) and generated-question strings, for the rerank model call.
async fn build_passage(chunks: &dyn ChunkRepository, result: &SearchResult) -> String {
    let mut passage = result.content.clone();

    if let Some(items) = result.image_info.as_array() {
        for item in items {
            if let Some(caption) = item.get("caption").and_then(serde_json::Value::as_str) {
                passage.push('\n');
                passage.push_str(caption);
            }
            if let Some(ocr) = item.get("ocr_text").and_then(serde_json::Value::as_str) {
                passage.push('\n');
                passage.push_str(ocr);
            }
        }
    }

    match chunks.get_generated_questions(&result.id).await {
        Ok(questions) => {
            for q in questions {
                passage.push('\n');
                passage.push_str(&q);
            }
        }
        Err(e) => tracing::debug!(error = %e, chunk_id = %result.id, "no generated questions available"),
    }

    passage
}

/// The effective rerank threshold for one candidate: history-matched
/// candidates get a concession (spec §4.4: `max(threshold - 0.1, 0.5)`).
fn effective_threshold(threshold: f32, match_type: MatchType) -> f32 {
    if matches!(match_type, MatchType::History) {
        (threshold - 0.1).max(0.5)
    } else {
        threshold
    }
}

/// Runs one model call's results through each candidate's effective
/// threshold; returns the surviving `(candidate_index, model_score)` pairs.
fn filter_by_threshold(scores: &[RerankScore], candidates: &[SearchResult], threshold: f32) -> Vec<(usize, f32)> {
    scores
        .iter()
        .filter(|s| candidates.get(s.index).is_some_and(|c| s.relevance >= effective_threshold(threshold, c.match_type)))
        .map(|s| (s.index, s.relevance))
        .collect()
}

/// Reranks `candidates` against `query` (spec §4.4): model call, threshold
/// filter with a single degraded-threshold retry if everything was filtered
/// out and the original threshold was above `0.3`, composite scoring, then
/// MMR selection of `k = min(len(candidates), max(1, rerank_top_k))`.
///
/// Returns the selected results (composite-scored, in MMR selection order)
/// and the average pairwise redundancy diagnostic.
pub async fn rerank(
    reranker: &dyn Reranker,
    chunks: &dyn ChunkRepository,
    query: &str,
    candidates: Vec<SearchResult>,
    threshold: f32,
    rerank_top_k: usize,
) -> Result<(Vec<SearchResult>, f32), AppError> {
    if candidates.is_empty() {
        return Ok((Vec::new(), 0.0));
    }

    let mut passages = Vec::with_capacity(candidates.len());
    for c in &candidates {
        passages.push(build_passage(chunks, c).await);
    }

    let scores = reranker.rerank(query, &passages).await?;
    let mut survivors = filter_by_threshold(&scores, &candidates, threshold);

    if survivors.is_empty() && threshold > 0.3 {
        let degraded = (threshold * 0.7).max(0.3);
        tracing::debug!(original = threshold, degraded, "rerank threshold degraded retry");
        survivors = filter_by_threshold(&scores, &candidates, degraded);
    }

    if survivors.is_empty() {
        return Ok((Vec::new(), 0.0));
    }

    let mut scored: Vec<SearchResult> = Vec::with_capacity(survivors.len());
    let mut relevance = Vec::with_capacity(survivors.len());
    let mut tokens = Vec::with_capacity(survivors.len());

    for (idx, model_score) in survivors {
        let Some(candidate) = candidates.get(idx) else { continue };
        let source = knowledge_source_of(candidate);
        let composite = composite_score(model_score, candidate.score, &source, candidate.start_at, candidate.end_at);
        let mut result = candidate.clone();
        result.score = composite;
        tokens.push(tokenize(&result.content));
        relevance.push(composite);
        scored.push(result);
    }

    let k = scored.len().min(rerank_top_k.max(1));
    let (selected_idx, redundancy) = mmr_select(&relevance, &tokens, k, MMR_LAMBDA);
    let selected = selected_idx.into_iter().filter_map(|i| scored.get(i).cloned()).collect();

    Ok((selected, redundancy))
}

/// Scores direct-load bypass results through the same composite formula with
/// `model_score = 1.0` (spec §4.4), without going through the reranker model
/// or MMR selection. Direct-load already returns a bounded, pre-deduped set.
#[must_use]
pub fn score_direct_load(results: Vec<SearchResult>) -> Vec<SearchResult> {
    results
        .into_iter()
        .map(|mut r| {
            let source = knowledge_source_of(&r);
            r.score = composite_score(1.0, r.score, &source, r.start_at, r.end_at);
            r
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{rerank, score_direct_load};
    use async_trait::async_trait;
    use rag_core::collaborators::{ChunkRepository, ChunkRow, FaqMetadata, NeighborDirection, RerankScore, Reranker};
    use rag_core::model::{ChunkType, MatchType, SearchResult};
    use rag_core::AppError;
    use std::collections::HashMap;

    struct StubReranker(Vec<RerankScore>);

    #[async_trait]
    impl Reranker for StubReranker {
        async fn rerank(&self, _query: &str, _passages: &[String]) -> Result<Vec<RerankScore>, AppError> {
            Ok(self.0.clone())
        }
    }

    struct StubChunks;

    #[async_trait]
    impl ChunkRepository for StubChunks {
        async fn get_chunk(&self, _chunk_id: &str) -> Result<Option<ChunkRow>, AppError> {
            Ok(None)
        }
        async fn get_neighbor(&self, _chunk_id: &str, _direction: NeighborDirection) -> Result<Option<ChunkRow>, AppError> {
            Ok(None)
        }
        async fn list_chunks_by_knowledge_ids(&self, _ids: &[String]) -> Result<Vec<ChunkRow>, AppError> {
            Ok(Vec::new())
        }
        async fn count_chunks(&self, _ids: &[String]) -> Result<u64, AppError> {
            Ok(0)
        }
        async fn get_faq_metadata(&self, _chunk_id: &str) -> Result<Option<FaqMetadata>, AppError> {
            Ok(None)
        }
        async fn get_generated_questions(&self, _chunk_id: &str) -> Result<Vec<String>, AppError> {
            Ok(Vec::new())
        }
    }

    fn candidate(id: &str, content: &str, base_score: f32) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            content: content.to_string(),
            score: base_score,
            knowledge_id: "k1".into(),
            knowledge_title: "Doc".into(),
            chunk_index: 0,
            start_at: 0,
            end_at: content.chars().count() as i64,
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

    #[tokio::test]
    async fn filters_below_threshold_and_composite_scores_survivors() {
        let candidates = vec![candidate("a", "kubelet certs rotate automatically", 0.5), candidate("b", "unrelated content entirely", 0.5)];
        let reranker = StubReranker(vec![RerankScore { index: 0, relevance: 0.9 }, RerankScore { index: 1, relevance: 0.1 }]);
        let (selected, _redundancy) = rerank(&reranker, &StubChunks, "kubelet cert rotation", candidates, 0.5, 5).await.unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "a");
        assert!((0.0..=1.0).contains(&selected[0].score));
    }

    #[tokio::test]
    async fn degrades_threshold_once_when_nothing_survives() {
        let candidates = vec![candidate("a", "kubelet certs", 0.5)];
        let reranker = StubReranker(vec![RerankScore { index: 0, relevance: 0.35 }]);
        let (selected, _) = rerank(&reranker, &StubChunks, "q", candidates, 0.5, 5).await.unwrap();
        assert_eq!(selected.len(), 1);
    }

    #[tokio::test]
    async fn low_threshold_with_no_survivors_stays_empty() {
        let candidates = vec![candidate("a", "kubelet certs", 0.5)];
        let reranker = StubReranker(vec![RerankScore { index: 0, relevance: 0.1 }]);
        let (selected, _) = rerank(&reranker, &StubChunks, "q", candidates, 0.2, 5).await.unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn direct_load_scoring_uses_model_score_one() {
        let results = score_direct_load(vec![candidate("a", "x", 1.0)]);
        assert!((0.0..=1.0).contains(&results[0].score));
        assert!(results[0].score > 0.9);
    }
}
