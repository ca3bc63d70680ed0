//! The direct-load fast path (spec §4.3 step 1): a `Knowledge`-scoped target
//! whose combined chunk count is small enough bypasses semantic search
//! entirely.

use rag_core::collaborators::ChunkRepository;
use rag_core::model::{MatchType, SearchResult};
use rag_core::AppError;

/// Chunk counts at or below this bypass semantic search entirely.
pub const DIRECT_LOAD_MAX_CHUNKS: u64 = 50;

/// Loads every chunk of `knowledge_ids` as `SearchResult`s with
/// `match_type=direct_load, score=1.0` if their combined count is within
/// [`DIRECT_LOAD_MAX_CHUNKS`]; `Ok(None)` otherwise, signalling the caller
/// to fall through to hybrid search instead.
pub async fn try_direct_load(
    chunks: &dyn ChunkRepository,
    knowledge_ids: &[String],
) -> Result<Option<Vec<SearchResult>>, AppError> {
    if knowledge_ids.is_empty() {
        return Ok(None);
    }

    let count = chunks.count_chunks(knowledge_ids).await?;
    if count > DIRECT_LOAD_MAX_CHUNKS {
        return Ok(None);
    }

    let rows = chunks.list_chunks_by_knowledge_ids(knowledge_ids).await?;
    let results = rows
        .into_iter()
        .map(|row| SearchResult {
            id: row.chunk_id.clone(),
            content: row.content,
            score: 1.0,
            knowledge_id: row.knowledge_id,
            knowledge_title: row.knowledge_title,
            chunk_index: 0,
            start_at: row.start_at,
            end_at: row.end_at,
            seq: row.seq,
            match_type: MatchType::DirectLoad,
            sub_chunk_id: Vec::new(),
            chunk_type: row.chunk_type,
            parent_chunk_id: row.parent_chunk_id,
            image_info: row.image_info,
            metadata: std::collections::HashMap::new(),
            chunk_metadata: row.chunk_metadata,
        })
        .collect();
    Ok(Some(results))
}

#[cfg(test)]
mod tests {
    use super::{try_direct_load, DIRECT_LOAD_MAX_CHUNKS};
    use async_trait::async_trait;
    use rag_core::collaborators::{ChunkRepository, ChunkRow, FaqMetadata, NeighborDirection};
    use rag_core::model::ChunkType;
    use rag_core::AppError;

    struct FakeChunks {
        rows: Vec<ChunkRow>,
    }

    fn row(id: &str, knowledge_id: &str) -> ChunkRow {
        ChunkRow {
            id: id.to_string(),
            chunk_id: id.to_string(),
            knowledge_id: knowledge_id.to_string(),
            knowledge_title: "Doc".into(),
            content: "hello".into(),
            start_at: 0,
            end_at: 5,
            seq: 0,
            chunk_type: ChunkType::Text,
            parent_chunk_id: None,
            pre_chunk_id: None,
            next_chunk_id: None,
            image_info: serde_json::Value::Null,
            chunk_metadata: vec![],
        }
    }

    #[async_trait]
    impl ChunkRepository for FakeChunks {
        async fn get_chunk(&self, _chunk_id: &str) -> Result<Option<ChunkRow>, AppError> {
            Ok(None)
        }
        async fn get_neighbor(&self, _chunk_id: &str, _direction: NeighborDirection) -> Result<Option<ChunkRow>, AppError> {
            Ok(None)
        }
        async fn list_chunks_by_knowledge_ids(&self, _ids: &[String]) -> Result<Vec<ChunkRow>, AppError> {
            Ok(self.rows.clone())
        }
        async fn count_chunks(&self, _ids: &[String]) -> Result<u64, AppError> {
            Ok(self.rows.len() as u64)
        }
        async fn get_faq_metadata(&self, _chunk_id: &str) -> Result<Option<FaqMetadata>, AppError> {
            Ok(None)
        }
        async fn get_generated_questions(&self, _chunk_id: &str) -> Result<Vec<String>, AppError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn loads_everything_under_the_cap() {
        let repo = FakeChunks { rows: vec![row("a", "k1"), row("b", "k1")] };
        let out = try_direct_load(&repo, &["k1".to_string()]).await.unwrap().unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.score == 1.0));
        assert!(out.iter().all(|r| matches!(r.match_type, rag_core::model::MatchType::DirectLoad)));
    }

    #[tokio::test]
    async fn falls_through_when_over_the_cap() {
        let rows = (0..DIRECT_LOAD_MAX_CHUNKS + 1).map(|i| row(&i.to_string(), "k1")).collect();
        let repo = FakeChunks { rows };
        let out = try_direct_load(&repo, &["k1".to_string()]).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn empty_knowledge_ids_skips_lookup() {
        let repo = FakeChunks { rows: vec![] };
        let out = try_direct_load(&repo, &[]).await.unwrap();
        assert!(out.is_none());
    }
}
