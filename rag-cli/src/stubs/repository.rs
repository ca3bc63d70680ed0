//! In-memory `ChunkRepository`/`KnowledgeRepository`/`GraphRepository`
//! stubs for local exercising. Hand-written test doubles the way the
//! teacher writes `EmbeddingProvider::new_hashed` instead of mocking
//! (SPEC_FULL §B "Test tooling").

use std::collections::HashMap;

use async_trait::async_trait;
use rag_core::collaborators::{
    ChunkRepository, ChunkRow, FaqMetadata, GraphEdge, GraphRepository, KnowledgeRepository, NeighborDirection,
};
use rag_core::AppError;
use tokio::sync::RwLock;

pub struct InMemoryChunkRepository {
    chunks: Vec<ChunkRow>,
    faq: HashMap<String, FaqMetadata>,
    generated_questions: HashMap<String, Vec<String>>,
}

impl InMemoryChunkRepository {
    #[must_use]
    pub fn new(chunks: Vec<ChunkRow>, faq: HashMap<String, FaqMetadata>, generated_questions: HashMap<String, Vec<String>>) -> Self {
        Self { chunks, faq, generated_questions }
    }

    fn find(&self, chunk_id: &str) -> Option<&ChunkRow> {
        self.chunks.iter().find(|c| c.chunk_id == chunk_id)
    }
}

#[async_trait]
impl ChunkRepository for InMemoryChunkRepository {
    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<ChunkRow>, AppError> {
        Ok(self.find(chunk_id).cloned())
    }

    async fn get_neighbor(&self, chunk_id: &str, direction: NeighborDirection) -> Result<Option<ChunkRow>, AppError> {
        let Some(row) = self.find(chunk_id) else {
            return Ok(None);
        };
        let neighbor_id = match direction {
            NeighborDirection::Previous => row.pre_chunk_id.clone(),
            NeighborDirection::Next => row.next_chunk_id.clone(),
        };
        Ok(neighbor_id.and_then(|id| self.find(&id).cloned()))
    }

    async fn list_chunks_by_knowledge_ids(&self, knowledge_ids: &[String]) -> Result<Vec<ChunkRow>, AppError> {
        Ok(self.chunks.iter().filter(|c| knowledge_ids.iter().any(|k| k == &c.knowledge_id)).cloned().collect())
    }

    async fn count_chunks(&self, knowledge_ids: &[String]) -> Result<u64, AppError> {
        Ok(u64::try_from(self.list_chunks_by_knowledge_ids(knowledge_ids).await?.len()).unwrap_or(u64::MAX))
    }

    async fn get_faq_metadata(&self, chunk_id: &str) -> Result<Option<FaqMetadata>, AppError> {
        Ok(self.faq.get(chunk_id).cloned())
    }

    async fn get_generated_questions(&self, chunk_id: &str) -> Result<Vec<String>, AppError> {
        Ok(self.generated_questions.get(chunk_id).cloned().unwrap_or_default())
    }
}

pub struct InMemoryKnowledgeRepository {
    titles: HashMap<String, String>,
    ephemeral: RwLock<HashMap<String, String>>,
}

impl InMemoryKnowledgeRepository {
    #[must_use]
    pub fn new(titles: HashMap<String, String>) -> Self {
        Self { titles, ephemeral: RwLock::new(HashMap::new()) }
    }
}

#[async_trait]
impl KnowledgeRepository for InMemoryKnowledgeRepository {
    async fn get_title(&self, knowledge_id: &str) -> Result<Option<String>, AppError> {
        Ok(self.titles.get(knowledge_id).cloned())
    }

    async fn ensure_ephemeral_kb(&self, session_id: &str) -> Result<String, AppError> {
        let mut ephemeral = self.ephemeral.write().await;
        if let Some(id) = ephemeral.get(session_id) {
            return Ok(id.clone());
        }
        let id = format!("ephemeral-{session_id}");
        ephemeral.insert(session_id.to_string(), id.clone());
        Ok(id)
    }
}

/// No entity graph is seeded in the demo; `ctx.entity` is empty by default
/// so the coordinator's graph join is a no-op either way.
pub struct InMemoryGraphRepository;

#[async_trait]
impl GraphRepository for InMemoryGraphRepository {
    async fn find_by_entity(&self, _kb_id: &str, _knowledge_id: Option<&str>, _entity: &str) -> Result<Vec<GraphEdge>, AppError> {
        Ok(Vec::new())
    }
}
