//! Merge stage (spec §4.5): stitches adjacent/overlapping chunks within a
//! knowledge id, renders FAQ content, expands short text chunks with their
//! neighbors, and produces the final score-sorted result set. No direct
//! teacher equivalent exists for stitching/neighbor-expansion (grepped
//! `retrieval-pipeline/src/pipeline/stages/mod.rs` for "stitch"/"neighbor"/
//! "overlap" and found nothing matching); grounded directly on spec §4.5.

use rag_core::collaborators::{ChunkRepository, NeighborDirection};
use rag_core::model::{ChunkType, SearchResult};
use rag_core::AppError;

const NEIGHBOR_EXPANSION_MIN_RUNES: usize = 350;
const NEIGHBOR_EXPANSION_MAX_RUNES: usize = 850;

/// Groups by `knowledge_id` (first-seen order), stitches each group, renders
/// FAQ content, expands short text chunks, then sorts the merged set by
/// score descending.
pub async fn merge(chunks: &dyn ChunkRepository, candidates: Vec<SearchResult>) -> Result<Vec<SearchResult>, AppError> {
    let mut groups: Vec<(String, Vec<SearchResult>)> = Vec::new();
    for candidate in candidates {
        match groups.iter_mut().find(|(id, _)| *id == candidate.knowledge_id) {
            Some(group) => group.1.push(candidate),
            None => groups.push((candidate.knowledge_id.clone(), vec![candidate])),
        }
    }

    let mut merged = Vec::new();
    for (_, group) in groups {
        merged.extend(stitch_group(group));
    }

    for result in &mut merged {
        enrich_faq(chunks, result).await?;
        expand_short_context(chunks, result).await?;
    }

    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(merged)
}

/// Sorts one knowledge id's candidates by `(start_at, end_at)`, peels off a
/// leading summary chunk as a separate anchor, then greedily stitches the
/// rest wherever a chunk's start falls within or adjacent to the previous
/// chunk's span.
fn stitch_group(mut group: Vec<SearchResult>) -> Vec<SearchResult> {
    group.sort_by(|a, b| a.start_at.cmp(&b.start_at).then(a.end_at.cmp(&b.end_at)));

    let mut anchors = Vec::new();
    if matches!(group.first().map(|r| r.chunk_type), Some(ChunkType::Summary)) {
        anchors.push(group.remove(0));
    }

    let mut stitched: Vec<SearchResult> = Vec::with_capacity(group.len());
    for chunk in group {
        match stitched.last_mut() {
            Some(last) if chunk.start_at <= last.end_at + 1 => merge_into(last, &chunk),
            _ => stitched.push(chunk),
        }
    }

    anchors.extend(stitched);
    anchors
}

/// Merges `chunk` into `last` in place: overlapping tail computed in rune
/// space, `end_at` extended, `sub_chunk_id` appended, `score` = max,
/// `image_info` unioned by `url`.
fn merge_into(last: &mut SearchResult, chunk: &SearchResult) {
    let overlap = (last.end_at - chunk.start_at).max(0) as usize;
    let chunk_chars: Vec<char> = chunk.content.chars().collect();
    let tail: String = chunk_chars.iter().skip(overlap.min(chunk_chars.len())).collect();
    last.content.push_str(&tail);
    last.end_at = last.end_at.max(chunk.end_at);
    last.sub_chunk_id.push(chunk.id.clone());
    last.score = last.score.max(chunk.score);
    union_image_info(last, chunk);
}

/// Unions `chunk.image_info` into `last.image_info` by `url`, keeping
/// deterministic (first-seen) order.
fn union_image_info(last: &mut SearchResult, chunk: &SearchResult) {
    let mut items: Vec<serde_json::Value> = last.image_info.as_array().cloned().unwrap_or_default();
    let mut seen: std::collections::HashSet<String> =
        items.iter().filter_map(|v| v.get("url").and_then(|u| u.as_str()).map(str::to_string)).collect();

    if let Some(chunk_items) = chunk.image_info.as_array() {
        for item in chunk_items {
            if let Some(url) = item.get("url").and_then(|u| u.as_str()).map(str::to_string) {
                if seen.insert(url) {
                    items.push(item.clone());
                }
            }
        }
    }

    if !items.is_empty() {
        last.image_info = serde_json::Value::Array(items);
    }
}

/// For `chunk_type=faq` results, replaces `content` with the canonical
/// `"Q: ...\nAnswer:\n- ..."` rendering, leaving content untouched if no FAQ
/// metadata is found.
async fn enrich_faq(chunks: &dyn ChunkRepository, result: &mut SearchResult) -> Result<(), AppError> {
    if !matches!(result.chunk_type, ChunkType::Faq) {
        return Ok(());
    }

    if let Some(meta) = chunks.get_faq_metadata(&result.id).await? {
        let mut rendered = format!("Q: {}\nAnswer:\n", meta.question);
        for answer in &meta.answers {
            rendered.push_str("- ");
            rendered.push_str(answer);
            rendered.push('\n');
        }
        result.content = rendered.trim_end().to_string();
    }

    Ok(())
}

/// For text chunks shorter than `NEIGHBOR_EXPANSION_MIN_RUNES`, walks
/// previous/next neighbors from the same knowledge id via
/// `ChunkRepository::get_neighbor`, concatenating with overlap-aware trimming
/// until the total length falls in `[350, 850]` or neighbors are exhausted.
async fn expand_short_context(chunks: &dyn ChunkRepository, result: &mut SearchResult) -> Result<(), AppError> {
    if !matches!(result.chunk_type, ChunkType::Text) || result.rune_len() >= NEIGHBOR_EXPANSION_MIN_RUNES {
        return Ok(());
    }

    let base_start = result.start_at;
    let mut prev_text = String::new();
    let mut next_text = String::new();
    let mut prev_ids: Vec<String> = Vec::new();
    let mut next_ids: Vec<String> = Vec::new();
    let mut prev_cursor = Some(result.id.clone());
    let mut next_cursor = Some(result.id.clone());

    loop {
        let total = prev_text.chars().count() + result.rune_len() + next_text.chars().count();
        if (NEIGHBOR_EXPANSION_MIN_RUNES..=NEIGHBOR_EXPANSION_MAX_RUNES).contains(&total) {
            break;
        }
        if prev_cursor.is_none() && next_cursor.is_none() {
            break;
        }

        let mut extended = false;

        if let Some(cursor) = prev_cursor.clone() {
            match chunks.get_neighbor(&cursor, NeighborDirection::Previous).await? {
                Some(row) => {
                    prev_text = overlap_aware_concat(&row.content, &prev_text);
                    prev_ids.push(row.chunk_id.clone());
                    prev_cursor = Some(row.chunk_id);
                    extended = true;
                }
                None => prev_cursor = None,
            }
        }

        let total = prev_text.chars().count() + result.rune_len() + next_text.chars().count();
        if (NEIGHBOR_EXPANSION_MIN_RUNES..=NEIGHBOR_EXPANSION_MAX_RUNES).contains(&total) {
            break;
        }

        if let Some(cursor) = next_cursor.clone() {
            match chunks.get_neighbor(&cursor, NeighborDirection::Next).await? {
                Some(row) => {
                    next_text = overlap_aware_concat(&next_text, &row.content);
                    next_ids.push(row.chunk_id.clone());
                    next_cursor = Some(row.chunk_id);
                    extended = true;
                }
                None => next_cursor = None,
            }
        }

        if !extended {
            break;
        }
    }

    if prev_ids.is_empty() && next_ids.is_empty() {
        return Ok(());
    }

    let prev_len = prev_text.chars().count() as i64;
    result.content = format!("{prev_text}{}{next_text}", result.content);
    result.start_at = (base_start - prev_len).max(0);
    result.end_at = result.start_at + result.rune_len() as i64;
    result.sub_chunk_id.extend(prev_ids.into_iter().rev());
    result.sub_chunk_id.extend(next_ids);

    Ok(())
}

/// Concatenates `left` and `right`, trimming the longest suffix of `left`
/// that is also a prefix of `right` (rune space) so a repeated overlap isn't
/// duplicated.
fn overlap_aware_concat(left: &str, right: &str) -> String {
    let left_chars: Vec<char> = left.chars().collect();
    let right_chars: Vec<char> = right.chars().collect();
    let max_overlap = left_chars.len().min(right_chars.len());

    let mut overlap = 0;
    for len in (1..=max_overlap).rev() {
        if left_chars[left_chars.len() - len..] == right_chars[..len] {
            overlap = len;
            break;
        }
    }

    let mut combined: String = left_chars.iter().collect();
    combined.extend(&right_chars[overlap..]);
    combined
}

#[cfg(test)]
mod tests {
    use super::{merge, overlap_aware_concat};
    use async_trait::async_trait;
    use rag_core::collaborators::{ChunkRepository, ChunkRow, FaqMetadata, NeighborDirection};
    use rag_core::model::{ChunkType, MatchType, SearchResult};
    use rag_core::AppError;
    use std::collections::HashMap;

    fn result(id: &str, knowledge_id: &str, content: &str, start_at: i64, chunk_type: ChunkType) -> SearchResult {
        let end_at = start_at + content.chars().count() as i64;
        SearchResult {
            id: id.to_string(),
            content: content.to_string(),
            score: 0.5,
            knowledge_id: knowledge_id.to_string(),
            knowledge_title: "Doc".into(),
            chunk_index: 0,
            start_at,
            end_at,
            seq: 0,
            match_type: MatchType::Vector,
            sub_chunk_id: vec![],
            chunk_type,
            parent_chunk_id: None,
            image_info: serde_json::Value::Null,
            metadata: HashMap::new(),
            chunk_metadata: vec![],
        }
    }

    struct StubChunks {
        faq: Option<FaqMetadata>,
    }

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
            Ok(self.faq.clone())
        }
        async fn get_generated_questions(&self, _chunk_id: &str) -> Result<Vec<String>, AppError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn overlap_aware_concat_trims_repeated_suffix_prefix() {
        assert_eq!(overlap_aware_concat("hello wor", "world foo"), "hello world foo");
        assert_eq!(overlap_aware_concat("abc", "def"), "abcdef");
    }

    #[tokio::test]
    async fn stitches_overlapping_chunks_in_same_knowledge_id() {
        let a = result("a", "k1", "the quick brown ", 0, ChunkType::Text);
        let b = result("b", "k1", "brown fox jumps", 11, ChunkType::Text);
        let chunks = StubChunks { faq: None };
        let merged = merge(&chunks, vec![a, b]).await.unwrap();
        assert_eq!(merged.len(), 1);
        assert!(merged[0].content.contains("fox jumps"));
        assert_eq!(merged[0].sub_chunk_id, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn keeps_non_adjacent_chunks_separate() {
        let a = result("a", "k1", "first section", 0, ChunkType::Text);
        let b = result("b", "k1", "far later section", 1000, ChunkType::Text);
        let chunks = StubChunks { faq: None };
        let merged = merge(&chunks, vec![a, b]).await.unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[tokio::test]
    async fn faq_chunks_are_rendered_canonically() {
        let faq = result("f1", "k1", "raw faq content", 0, ChunkType::Faq);
        let chunks = StubChunks { faq: Some(FaqMetadata { question: "How do I reset?".into(), answers: vec!["Click reset".into(), "Wait 10s".into()] }) };
        let merged = merge(&chunks, vec![faq]).await.unwrap();
        assert!(merged[0].content.starts_with("Q: How do I reset?"));
        assert!(merged[0].content.contains("- Click reset"));
        assert!(merged[0].content.contains("- Wait 10s"));
    }

    #[tokio::test]
    async fn sorts_merged_results_by_score_descending() {
        let mut low = result("a", "k1", "low", 0, ChunkType::Text);
        low.score = 0.1;
        let mut high = result("b", "k2", "high", 0, ChunkType::Text);
        high.score = 0.9;
        let chunks = StubChunks { faq: None };
        let merged = merge(&chunks, vec![low, high]).await.unwrap();
        assert_eq!(merged[0].id, "b");
        assert_eq!(merged[1].id, "a");
    }
}
