//! The web-search step (spec §4.3 step 3): fetch hits from the tenant's
//! configured provider, "compress" them into the session's ephemeral
//! knowledge base, and surface them as `SearchResult`s with
//! `match_type=web, score=0.6`.

use rag_core::collaborators::{KnowledgeRepository, WebSearchHit, WebSearchService};
use rag_core::model::{ChunkType, MatchType, SearchResult};
use rag_core::AppError;

/// Default relevance assigned to a web hit, absent a reranker pass.
pub const WEB_SEARCH_DEFAULT_SCORE: f32 = 0.6;

/// Runs the provider search, ensures a per-session ephemeral KB exists to
/// anchor the hits, and converts each hit into a `SearchResult`.
///
/// "Compress-with-RAG" here means: the hit's full `content` (when the
/// provider fetched the page body) or its `snippet` becomes the chunk
/// content verbatim, attributed to the ephemeral KB, so later reranking and
/// merging treat web results exactly like any other `knowledge_id` group.
/// Deeper summarization of fetched pages is the web-search provider's
/// concern, not the coordinator's.
pub async fn search_and_compress(
    web: &dyn WebSearchService,
    knowledge: &dyn KnowledgeRepository,
    session_id: &str,
    query: &str,
) -> Result<Vec<SearchResult>, AppError> {
    let hits = web.search(query).await?;
    if hits.is_empty() {
        return Ok(Vec::new());
    }

    let ephemeral_kb = knowledge.ensure_ephemeral_kb(session_id).await?;
    Ok(hits.into_iter().enumerate().map(|(i, hit)| hit_to_result(hit, &ephemeral_kb, i)).collect())
}

fn hit_to_result(hit: WebSearchHit, knowledge_id: &str, seq: usize) -> SearchResult {
    let content = hit.content.unwrap_or(hit.snippet);
    let end_at = content.chars().count() as i64;
    let mut metadata = std::collections::HashMap::new();
    metadata.insert("url".to_string(), hit.url);
    SearchResult {
        id: uuid::Uuid::new_v4().to_string(),
        content,
        score: WEB_SEARCH_DEFAULT_SCORE,
        knowledge_id: knowledge_id.to_string(),
        knowledge_title: hit.title,
        chunk_index: seq as i64,
        start_at: 0,
        end_at,
        seq: seq as i64,
        match_type: MatchType::Web,
        sub_chunk_id: Vec::new(),
        chunk_type: ChunkType::Web,
        parent_chunk_id: None,
        image_info: serde_json::Value::Null,
        metadata,
        chunk_metadata: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{search_and_compress, WEB_SEARCH_DEFAULT_SCORE};
    use async_trait::async_trait;
    use rag_core::collaborators::{KnowledgeRepository, WebSearchHit, WebSearchService};
    use rag_core::model::MatchType;
    use rag_core::AppError;

    struct FakeWeb(Vec<WebSearchHit>);

    #[async_trait]
    impl WebSearchService for FakeWeb {
        async fn search(&self, _query: &str) -> Result<Vec<WebSearchHit>, AppError> {
            Ok(self.0.clone())
        }
    }

    struct FakeKnowledge;

    #[async_trait]
    impl KnowledgeRepository for FakeKnowledge {
        async fn get_title(&self, _knowledge_id: &str) -> Result<Option<String>, AppError> {
            Ok(None)
        }
        async fn ensure_ephemeral_kb(&self, session_id: &str) -> Result<String, AppError> {
            Ok(format!("ephemeral-{session_id}"))
        }
    }

    #[tokio::test]
    async fn converts_hits_with_default_score_and_web_match_type() {
        let web = FakeWeb(vec![WebSearchHit {
            url: "https://example.com".into(),
            title: "Example".into(),
            snippet: "a summary".into(),
            content: None,
        }]);
        let results = search_and_compress(&web, &FakeKnowledge, "sess1", "query").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, WEB_SEARCH_DEFAULT_SCORE);
        assert!(matches!(results[0].match_type, MatchType::Web));
        assert_eq!(results[0].knowledge_id, "ephemeral-sess1");
    }

    #[tokio::test]
    async fn empty_hits_skip_ephemeral_kb_creation() {
        let web = FakeWeb(vec![]);
        let results = search_and_compress(&web, &FakeKnowledge, "sess1", "query").await.unwrap();
        assert!(results.is_empty());
    }
}
