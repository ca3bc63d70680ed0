//! Entity-graph join (spec §4.3): runs in parallel with the main search when
//! the request carries pre-extracted entities and at least one graph-enabled
//! KB. For each `(kb, knowledge_id?)` pair, queries the graph repository,
//! unions nodes/relations, hydrates the resulting chunk ids via the chunk
//! repository, and folds the hydrated chunks into the search results.

use std::collections::HashSet;

use rag_core::collaborators::{ChunkRepository, GraphRepository};
use rag_core::model::chat_context::{Entity, GraphResult};
use rag_core::model::{MatchType, SearchResult};
use rag_core::AppError;

/// One `(kb_id, knowledge_id)` pair to probe the graph repository with;
/// `knowledge_id = None` scopes the lookup to the whole KB.
#[derive(Debug, Clone)]
pub struct GraphTarget {
    pub kb_id: String,
    pub knowledge_id: Option<String>,
}

/// Looks up every `(target, entity)` pair concurrently, unions the returned
/// nodes/relations into one [`GraphResult`], hydrates the distinct chunk ids
/// via `chunks`, and returns them as `match_type=graph` search results
/// alongside the union.
pub async fn join(
    graph: &dyn GraphRepository,
    chunks: &dyn ChunkRepository,
    targets: &[GraphTarget],
    entities: &[Entity],
) -> Result<(GraphResult, Vec<SearchResult>), AppError> {
    let mut result = GraphResult::default();
    let mut chunk_ids: Vec<String> = Vec::new();
    let mut seen_chunk_ids = HashSet::new();

    for target in targets {
        for entity in entities {
            let edges = graph.find_by_entity(&target.kb_id, target.knowledge_id.as_deref(), &entity.name).await?;
            for edge in edges {
                if !result.node_ids.contains(&edge.node_id) {
                    result.node_ids.push(edge.node_id);
                }
                if !result.relation_ids.contains(&edge.relation_id) {
                    result.relation_ids.push(edge.relation_id);
                }
                if seen_chunk_ids.insert(edge.chunk_id.clone()) {
                    chunk_ids.push(edge.chunk_id);
                }
            }
        }
    }

    let mut hydrated = Vec::with_capacity(chunk_ids.len());
    for chunk_id in chunk_ids {
        if let Some(row) = chunks.get_chunk(&chunk_id).await? {
            hydrated.push(SearchResult {
                id: row.chunk_id.clone(),
                content: row.content,
                score: 1.0,
                knowledge_id: row.knowledge_id,
                knowledge_title: row.knowledge_title,
                chunk_index: 0,
                start_at: row.start_at,
                end_at: row.end_at,
                seq: row.seq,
                match_type: MatchType::Graph,
                sub_chunk_id: Vec::new(),
                chunk_type: row.chunk_type,
                parent_chunk_id: row.parent_chunk_id,
                image_info: row.image_info,
                metadata: std::collections::HashMap::new(),
                chunk_metadata: row.chunk_metadata,
            });
        }
    }

    Ok((result, hydrated))
}

#[cfg(test)]
mod tests {
    use super::{join, GraphTarget};
    use async_trait::async_trait;
    use rag_core::collaborators::{ChunkRepository, ChunkRow, FaqMetadata, GraphEdge, GraphRepository, NeighborDirection};
    use rag_core::model::chat_context::Entity;
    use rag_core::model::ChunkType;
    use rag_core::AppError;

    struct FakeGraph;

    #[async_trait]
    impl GraphRepository for FakeGraph {
        async fn find_by_entity(&self, kb_id: &str, _knowledge_id: Option<&str>, entity: &str) -> Result<Vec<GraphEdge>, AppError> {
            if entity == "kubelet" {
                Ok(vec![GraphEdge { node_id: "n1".into(), relation_id: "r1".into(), chunk_id: "c1".into() }])
            } else {
                let _ = kb_id;
                Ok(vec![])
            }
        }
    }

    struct FakeChunks;

    #[async_trait]
    impl ChunkRepository for FakeChunks {
        async fn get_chunk(&self, chunk_id: &str) -> Result<Option<ChunkRow>, AppError> {
            Ok(Some(ChunkRow {
                id: chunk_id.to_string(),
                chunk_id: chunk_id.to_string(),
                knowledge_id: "k1".into(),
                knowledge_title: "Doc".into(),
                content: "certs rotate automatically".into(),
                start_at: 0,
                end_at: 27,
                seq: 0,
                chunk_type: ChunkType::Text,
                parent_chunk_id: None,
                pre_chunk_id: None,
                next_chunk_id: None,
                image_info: serde_json::Value::Null,
                chunk_metadata: vec![],
            }))
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

    #[tokio::test]
    async fn unions_edges_and_hydrates_chunks() {
        let targets = vec![GraphTarget { kb_id: "kb1".into(), knowledge_id: None }];
        let entities = vec![Entity { name: "kubelet".into(), kind: None }];
        let (graph_result, results) = join(&FakeGraph, &FakeChunks, &targets, &entities).await.unwrap();
        assert_eq!(graph_result.node_ids, vec!["n1".to_string()]);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].match_type, rag_core::model::MatchType::Graph));
    }

    #[tokio::test]
    async fn no_matching_entities_yields_empty_join() {
        let targets = vec![GraphTarget { kb_id: "kb1".into(), knowledge_id: None }];
        let entities = vec![Entity { name: "unrelated".into(), kind: None }];
        let (graph_result, results) = join(&FakeGraph, &FakeChunks, &targets, &entities).await.unwrap();
        assert!(graph_result.node_ids.is_empty());
        assert!(results.is_empty());
    }
}
