//! An in-process, non-persistent `RetrievalEngine` (`EngineType::Memory`)
//! for local exercising, grounded on the shape `rag-engine-postgres`'s
//! `query.rs` and `rag-engine-qdrant`'s `payload.rs` both follow: a stored
//! row type richer than `IndexEntry` (it also carries the joined metadata
//! columns a real schema stores alongside the vector/keyword data), scored
//! and filtered uniformly, then projected into `SearchResult` (spec §4.2).

use std::collections::HashMap;

use async_trait::async_trait;
use rag_core::model::{ChunkType, IndexEntry, MatchType, SearchResult};
use rag_engine_core::{
    rewrite_source_id, Capabilities, CopyIndicesRequest, DeleteIdKind, DeleteRequest, EngineError, EngineType,
    RetrievalEngine, RetrieveParams,
};
use tokio::sync::RwLock;

/// One row of the in-memory table.
#[derive(Debug, Clone)]
pub struct MemoryRow {
    pub entry: IndexEntry,
    pub knowledge_title: String,
    pub chunk_index: i64,
    pub start_at: i64,
    pub end_at: i64,
    pub seq: i64,
    pub chunk_type: ChunkType,
    pub parent_chunk_id: Option<String>,
    pub sub_chunk_id: Vec<String>,
    pub image_info: serde_json::Value,
    pub chunk_metadata: Vec<u8>,
}

pub struct InMemoryEngine {
    rows: RwLock<Vec<MemoryRow>>,
}

impl InMemoryEngine {
    #[must_use]
    pub fn new(rows: Vec<MemoryRow>) -> Self {
        Self { rows: RwLock::new(rows) }
    }

    fn to_result(row: &MemoryRow, score: f32, match_type: MatchType) -> SearchResult {
        SearchResult {
            id: row.entry.id.clone(),
            content: row.entry.content.clone(),
            score: SearchResult::sanitized_score(score),
            knowledge_id: row.entry.knowledge_id.clone(),
            knowledge_title: row.knowledge_title.clone(),
            chunk_index: row.chunk_index,
            start_at: row.start_at,
            end_at: row.end_at,
            seq: row.seq,
            match_type,
            sub_chunk_id: row.sub_chunk_id.clone(),
            chunk_type: row.chunk_type,
            parent_chunk_id: row.parent_chunk_id.clone(),
            image_info: row.image_info.clone(),
            metadata: HashMap::new(),
            chunk_metadata: row.chunk_metadata.clone(),
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn tokenize(s: &str) -> std::collections::HashSet<String> {
    s.split(|ch: char| !ch.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase).collect()
}

fn term_overlap_score(query: &str, content: &str) -> f32 {
    let q = tokenize(query);
    if q.is_empty() {
        return 0.0;
    }
    let c = tokenize(content);
    let hits = q.intersection(&c).count();
    hits as f32 / q.len() as f32
}

#[async_trait]
impl RetrievalEngine for InMemoryEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Memory
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { keyword: true, vector: true }
    }

    async fn save(&self, entry: &IndexEntry) -> Result<(), EngineError> {
        self.batch_save(std::slice::from_ref(entry)).await
    }

    /// "On conflict do nothing" by `id`, matching every backend's insert
    /// contract (spec §7).
    async fn batch_save(&self, entries: &[IndexEntry]) -> Result<(), EngineError> {
        let mut rows = self.rows.write().await;
        for entry in entries {
            if rows.iter().any(|r| r.entry.id == entry.id) {
                continue;
            }
            rows.push(MemoryRow {
                end_at: i64::try_from(entry.content.chars().count()).unwrap_or(i64::MAX),
                knowledge_title: entry.knowledge_id.clone(),
                entry: entry.clone(),
                chunk_index: 0,
                start_at: 0,
                seq: 0,
                chunk_type: ChunkType::Text,
                parent_chunk_id: None,
                sub_chunk_id: Vec::new(),
                image_info: serde_json::Value::Null,
                chunk_metadata: Vec::new(),
            });
        }
        Ok(())
    }

    async fn delete(&self, req: &DeleteRequest) -> Result<(), EngineError> {
        let mut rows = self.rows.write().await;
        rows.retain(|r| {
            let candidate = match req.id_kind {
                DeleteIdKind::ChunkId => &r.entry.chunk_id,
                DeleteIdKind::SourceId => &r.entry.source_id,
                DeleteIdKind::KnowledgeId => &r.entry.knowledge_id,
            };
            !req.ids.iter().any(|id| id == candidate)
        });
        Ok(())
    }

    async fn keywords_retrieve(&self, params: &RetrieveParams) -> Result<Vec<SearchResult>, EngineError> {
        let query = params.query_text.as_deref().unwrap_or_default();
        let rows = self.rows.read().await;
        let mut scored: Vec<(f32, &MemoryRow)> = rows
            .iter()
            .filter(|r| params.filter.matches(&r.entry))
            .map(|r| (term_overlap_score(query, &r.entry.content), r))
            .filter(|(score, _)| *score >= params.keyword_threshold)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(params.match_count);
        Ok(scored.into_iter().map(|(score, row)| Self::to_result(row, score, MatchType::Keyword)).collect())
    }

    async fn vector_retrieve(&self, params: &RetrieveParams) -> Result<Vec<SearchResult>, EngineError> {
        let embedding = params
            .embedding
            .as_deref()
            .ok_or_else(|| EngineError::Query("vector_retrieve called without an embedding".to_string()))?;
        let rows = self.rows.read().await;
        let mut scored: Vec<(f32, &MemoryRow)> = rows
            .iter()
            .filter(|r| params.filter.matches(&r.entry) && r.entry.dimension == params.dimension)
            .map(|r| (cosine(embedding, &r.entry.embedding), r))
            .filter(|(score, _)| *score >= params.vector_threshold)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(params.match_count);
        Ok(scored.into_iter().map(|(score, row)| Self::to_result(row, score, MatchType::Vector)).collect())
    }

    async fn copy_indices(&self, req: &CopyIndicesRequest) -> Result<u64, EngineError> {
        let matches: Vec<MemoryRow> = {
            let rows = self.rows.read().await;
            rows.iter()
                .filter(|r| r.entry.knowledge_base_id == req.src_knowledge_base_id && r.entry.dimension == req.dimension)
                .cloned()
                .collect()
        };

        let mut copied = Vec::with_capacity(matches.len());
        let mut count = 0u64;
        for row in matches {
            let Some(new_chunk_id) = req.chunk_id_map.get(&row.entry.chunk_id).cloned() else { continue };
            let Some(new_knowledge_id) = req.knowledge_id_map.get(&row.entry.knowledge_id).cloned() else { continue };
            let new_source_id = rewrite_source_id(&row.entry.source_id, &row.entry.chunk_id, &new_chunk_id);
            let mut entry = row.entry.clone();
            entry.id = uuid::Uuid::new_v4().to_string();
            entry.chunk_id = new_chunk_id;
            entry.source_id = new_source_id;
            entry.knowledge_id = new_knowledge_id;
            entry.knowledge_base_id = req.dst_knowledge_base_id.clone();
            copied.push(MemoryRow { entry, ..row });
            count += 1;
        }
        self.rows.write().await.extend(copied);
        Ok(count)
    }

    async fn batch_update_chunk_enabled(&self, updates: &HashMap<String, bool>) -> Result<(), EngineError> {
        let mut rows = self.rows.write().await;
        for row in rows.iter_mut() {
            if let Some(enabled) = updates.get(&row.entry.chunk_id) {
                row.entry.is_enabled = Some(*enabled);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryEngine, MemoryRow};
    use rag_core::model::{ChunkType, IndexEntry};
    use rag_engine_core::{RetrievalEngine, RetrievalFilter, RetrieveParams, StorageKind};

    fn row(id: &str, content: &str, embedding: Vec<f32>) -> MemoryRow {
        MemoryRow {
            entry: IndexEntry::new(id, id, id, "text", "k1", "kb1", content, embedding),
            knowledge_title: "Doc".to_string(),
            chunk_index: 0,
            start_at: 0,
            end_at: content.chars().count() as i64,
            seq: 0,
            chunk_type: ChunkType::Text,
            parent_chunk_id: None,
            sub_chunk_id: Vec::new(),
            image_info: serde_json::Value::Null,
            chunk_metadata: Vec::new(),
        }
    }

    #[tokio::test]
    async fn keyword_retrieve_ranks_by_term_overlap() {
        let engine = InMemoryEngine::new(vec![
            row("r1", "rotate kubelet certificates every ninety days", vec![1.0, 0.0]),
            row("r2", "unrelated content about cooking pasta", vec![0.0, 1.0]),
        ]);
        let params = RetrieveParams {
            filter: RetrievalFilter { knowledge_base_ids: vec!["kb1".to_string()], ..Default::default() },
            kind: StorageKind::Keyword,
            query_text: Some("rotate certificates".to_string()),
            embedding: None,
            dimension: 2,
            vector_threshold: 0.0,
            keyword_threshold: 0.1,
            match_count: 10,
        };
        let results = engine.keywords_retrieve(&params).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "r1");
    }

    #[tokio::test]
    async fn vector_retrieve_filters_by_dimension() {
        let engine = InMemoryEngine::new(vec![row("r1", "hello", vec![1.0, 0.0])]);
        let params = RetrieveParams {
            filter: RetrievalFilter::default(),
            kind: StorageKind::Vector,
            query_text: None,
            embedding: Some(vec![1.0, 0.0, 0.0]),
            dimension: 3,
            vector_threshold: 0.0,
            keyword_threshold: 0.0,
            match_count: 10,
        };
        let results = engine.vector_retrieve(&params).await.unwrap();
        assert!(results.is_empty());
    }
}
