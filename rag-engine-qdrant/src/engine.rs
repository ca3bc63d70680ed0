//! [`QdrantEngine`]: the Qdrant-backed [`RetrievalEngine`] implementation.
//!
//! Grounded on the `ensure_collection`/`build_payload`/`search_points` shape
//! in `HybridRetriever` (see crate docs), generalized from one fixed
//! collection to one collection per embedding dimension via
//! [`rag_engine_core::ShardRegistry`] and spec §4.2's dimension-sharding
//! rule.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, PointId, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, SetPayloadPointsBuilder, TextIndexParamsBuilder, TokenizerType,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use rag_core::model::{IndexEntry, MatchType, SearchResult};
use rag_engine_core::{
    dimension::{sharded_name, ShardRegistry},
    engine::{
        rewrite_source_id, Capabilities, CopyIndicesRequest, DeleteIdKind, DeleteRequest,
        EngineType, RetrievalEngine, RetrieveParams,
    },
    error::EngineError,
    filter::{RetrievalFilter, Scope},
};

use crate::payload::{entry_to_payload_json, payload_json_to_search_result};
use crate::tokenizer::tokenize_for_search;

const KEYWORD_INDEXED_FIELDS: &[&str] =
    &["chunk_id", "knowledge_id", "knowledge_base_id", "source_id", "is_enabled"];

/// A `RetrievalEngine` backed by Qdrant, sharding collections by embedding
/// dimension (`"<base>_<dim>"`).
pub struct QdrantEngine {
    client: Qdrant,
    base_collection: String,
    registry: Arc<ShardRegistry>,
}

impl QdrantEngine {
    #[must_use]
    pub fn new(client: Qdrant, base_collection: impl Into<String>) -> Self {
        Self { client, base_collection: base_collection.into(), registry: Arc::new(ShardRegistry::new()) }
    }

    fn collection_name(&self, dim: u32) -> String {
        sharded_name(&self.base_collection, dim)
    }

    /// Creates the dimension's collection and payload indexes if this is the
    /// first call for that dimension; idempotent under races via
    /// double-checked locking over [`ShardRegistry`].
    #[tracing::instrument(skip(self))]
    async fn ensure_collection(&self, dim: u32) -> Result<(), EngineError> {
        let name = self.collection_name(dim);
        if self.registry.is_initialized(&self.base_collection, dim) {
            return Ok(());
        }

        let exists = self
            .client
            .collection_exists(&name)
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?;

        if exists {
            self.registry.mark_initialized(&self.base_collection, dim);
            return Ok(());
        }

        if !self.registry.mark_initialized(&self.base_collection, dim) {
            // Another caller won the race to create; nothing further to do.
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&name)
                    .vectors_config(VectorParamsBuilder::new(u64::from(dim), Distance::Cosine)),
            )
            .await
            .map_err(|e| EngineError::Connection(format!("create collection {name}: {e}")))?;

        for field in KEYWORD_INDEXED_FIELDS {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &name,
                    *field,
                    FieldType::Keyword,
                ))
                .await
                .map_err(|e| EngineError::Connection(format!("index {field}: {e}")))?;
        }

        self.client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(&name, "content", FieldType::Text).field_index_params(
                    TextIndexParamsBuilder::new(TokenizerType::Multilingual).lowercase(true),
                ),
            )
            .await
            .map_err(|e| EngineError::Connection(format!("index content: {e}")))?;

        tracing::info!(collection = %name, dim, "created qdrant collection");
        Ok(())
    }

    fn point_id(id: &str) -> PointId {
        PointId::from(id.to_string())
    }

    fn point_struct(entry: &IndexEntry) -> Result<PointStruct, EngineError> {
        let payload: Payload =
            entry_to_payload_json(entry).try_into().map_err(|e| EngineError::Internal(format!("payload: {e}")))?;
        Ok(PointStruct::new(Self::point_id(&entry.id), entry.embedding.clone(), payload))
    }

    /// Every sharded collection name touched so far, for sweeps that have
    /// no dimension of their own to key on (e.g. enabling/disabling a chunk
    /// id by id alone).
    fn known_collections(&self) -> Vec<String> {
        self.registry.known_names(&self.base_collection)
    }
}

fn filter_from_retrieval(filter: &RetrievalFilter) -> Filter {
    let mut must = vec![Condition::matches("is_enabled", true)];
    match filter.scope() {
        Scope::None => {}
        Scope::KnowledgeBases(kbs) => must.push(Condition::matches("knowledge_base_id", kbs)),
        Scope::Knowledge(kids) => must.push(Condition::matches("knowledge_id", kids)),
        Scope::Both { knowledge_base_ids, knowledge_ids } => {
            must.push(Condition::matches("knowledge_base_id", knowledge_base_ids));
            must.push(Condition::matches("knowledge_id", knowledge_ids));
        }
    }

    let mut must_not = Vec::new();
    if !filter.exclude_knowledge_ids.is_empty() {
        must_not.push(Condition::matches("knowledge_id", filter.exclude_knowledge_ids.clone()));
    }
    if !filter.exclude_chunk_ids.is_empty() {
        must_not.push(Condition::matches("chunk_id", filter.exclude_chunk_ids.clone()));
    }

    Filter { must, must_not, ..Default::default() }
}

#[async_trait]
impl RetrievalEngine for QdrantEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Qdrant
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { keyword: true, vector: true }
    }

    #[tracing::instrument(skip(self, entry))]
    async fn save(&self, entry: &IndexEntry) -> Result<(), EngineError> {
        self.ensure_collection(entry.dimension).await?;
        let point = Self::point_struct(entry)?;
        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection_name(entry.dimension), vec![point]).wait(true))
            .await
            .map_err(|e| EngineError::Query(e.to_string()))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, entries))]
    async fn batch_save(&self, entries: &[IndexEntry]) -> Result<(), EngineError> {
        let mut by_dim: HashMap<u32, Vec<PointStruct>> = HashMap::new();
        for entry in entries {
            self.ensure_collection(entry.dimension).await?;
            by_dim.entry(entry.dimension).or_default().push(Self::point_struct(entry)?);
        }
        for (dim, points) in by_dim {
            self.client
                .upsert_points(UpsertPointsBuilder::new(self.collection_name(dim), points).wait(true))
                .await
                .map_err(|e| EngineError::Query(e.to_string()))?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, req))]
    async fn delete(&self, req: &DeleteRequest) -> Result<(), EngineError> {
        let name = self.collection_name(req.dimension);
        let field = match req.id_kind {
            DeleteIdKind::ChunkId => "chunk_id",
            DeleteIdKind::SourceId => "source_id",
            DeleteIdKind::KnowledgeId => "knowledge_id",
        };
        let filter = Filter::must([Condition::matches(field, req.ids.clone())]);
        self.client
            .delete_points(DeletePointsBuilder::new(name).points(filter).wait(true))
            .await
            .map_err(|e| EngineError::Query(e.to_string()))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, params))]
    async fn keywords_retrieve(&self, params: &RetrieveParams) -> Result<Vec<SearchResult>, EngineError> {
        let query = params.query_text.as_deref().unwrap_or_default();
        let tokens = tokenize_for_search(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let name = self.collection_name(params.dimension);
        let mut must = vec![Condition::matches("is_enabled", true)];
        let base_filter = filter_from_retrieval(&params.filter);
        must.extend(base_filter.must);

        let should: Vec<Condition> = tokens.iter().map(|t| Condition::matches("content", t.clone())).collect();
        let filter = Filter { must, should, must_not: base_filter.must_not, ..Default::default() };

        let scrolled = self
            .client
            .scroll(
                ScrollPointsBuilder::new(&name)
                    .filter(filter)
                    .limit(u32::try_from(params.match_count).unwrap_or(u32::MAX))
                    .with_payload(true),
            )
            .await
            .map_err(|e| EngineError::Query(e.to_string()))?;

        let mut out = Vec::with_capacity(scrolled.result.len());
        for point in scrolled.result {
            let id = point.id.map(point_id_to_string).unwrap_or_default();
            let payload_value = payload_to_json(point.payload);
            let result = payload_json_to_search_result(id, 1.0, MatchType::Keyword, &payload_value)
                .map_err(|e| EngineError::Internal(e.to_string()))?;
            out.push(result);
        }
        out.truncate(params.match_count);
        Ok(out)
    }

    #[tracing::instrument(skip(self, params))]
    async fn vector_retrieve(&self, params: &RetrieveParams) -> Result<Vec<SearchResult>, EngineError> {
        let embedding = params
            .embedding
            .clone()
            .ok_or_else(|| EngineError::Query("vector_retrieve requires an embedding".to_string()))?;
        let name = self.collection_name(params.dimension);
        let filter = filter_from_retrieval(&params.filter);

        let search = self
            .client
            .search_points(
                SearchPointsBuilder::new(&name, embedding, u64::try_from(params.match_count).unwrap_or(u64::MAX))
                    .filter(filter)
                    .score_threshold(params.threshold())
                    .with_payload(true),
            )
            .await
            .map_err(|e| EngineError::Query(e.to_string()))?;

        let mut out = Vec::with_capacity(search.result.len());
        for point in search.result {
            let id = point.id.clone().map(point_id_to_string).unwrap_or_default();
            let payload_value = payload_to_json(point.payload.clone());
            let result = payload_json_to_search_result(id, point.score, MatchType::Vector, &payload_value)
                .map_err(|e| EngineError::Internal(e.to_string()))?;
            out.push(result);
        }
        Ok(out)
    }

    #[tracing::instrument(skip(self, req))]
    async fn copy_indices(&self, req: &CopyIndicesRequest) -> Result<u64, EngineError> {
        self.ensure_collection(req.dimension).await?;
        let name = self.collection_name(req.dimension);

        let mut copied: u64 = 0;
        let mut offset: Option<PointId> = None;
        loop {
            let mut builder = ScrollPointsBuilder::new(&name)
                .filter(Filter::must([Condition::matches("knowledge_base_id", vec![req.src_knowledge_base_id.clone()])]))
                .limit(u32::try_from(req.batch_size).unwrap_or(u32::MAX))
                .with_payload(true)
                .with_vectors(true);
            if let Some(o) = offset.clone() {
                builder = builder.offset(o);
            }

            let page = self.client.scroll(builder).await.map_err(|e| EngineError::Query(e.to_string()))?;
            if page.result.is_empty() {
                break;
            }

            let mut points = Vec::with_capacity(page.result.len());
            for point in &page.result {
                let payload_json = payload_to_json(point.payload.clone());
                let mut payload_map: serde_json::Map<String, serde_json::Value> =
                    payload_json.as_object().cloned().unwrap_or_default();

                let chunk_id = payload_map.get("chunk_id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let source_id = payload_map.get("source_id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let knowledge_id = payload_map.get("knowledge_id").and_then(|v| v.as_str()).unwrap_or_default().to_string();

                let Some(new_chunk_id) = req.chunk_id_map.get(&chunk_id) else { continue };
                let Some(new_knowledge_id) = req.knowledge_id_map.get(&knowledge_id) else { continue };
                let new_source_id = rewrite_source_id(&source_id, &chunk_id, new_chunk_id);

                payload_map.insert("chunk_id".to_string(), serde_json::json!(new_chunk_id));
                payload_map.insert("knowledge_id".to_string(), serde_json::json!(new_knowledge_id));
                payload_map.insert("knowledge_base_id".to_string(), serde_json::json!(req.dst_knowledge_base_id.clone()));
                payload_map.insert("source_id".to_string(), serde_json::json!(new_source_id));

                let payload: Payload = serde_json::Value::Object(payload_map)
                    .try_into()
                    .map_err(|e| EngineError::Internal(format!("payload: {e}")))?;
                let vectors = point.vectors.clone().ok_or_else(|| EngineError::Internal("missing vector".to_string()))?;
                points.push(PointStruct::new(Self::point_id(&uuid::Uuid::new_v4().to_string()), vectors, payload));
            }

            copied += points.len() as u64;
            self.client
                .upsert_points(UpsertPointsBuilder::new(&name, points).wait(true))
                .await
                .map_err(|e| EngineError::Query(e.to_string()))?;

            offset = page.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(copied)
    }

    #[tracing::instrument(skip(self, updates))]
    async fn batch_update_chunk_enabled(&self, updates: &HashMap<String, bool>) -> Result<(), EngineError> {
        // Qdrant has no cross-collection query; every known dimension shard
        // must be attempted since a chunk id doesn't carry its dimension.
        for collection in self.known_collections() {
            for (chunk_id, enabled) in updates {
                let filter = Filter::must([Condition::matches("chunk_id", vec![chunk_id.clone()])]);
                let payload: Payload = serde_json::json!({ "is_enabled": enabled })
                    .try_into()
                    .map_err(|e| EngineError::Internal(format!("payload: {e}")))?;
                let _ = self
                    .client
                    .set_payload(SetPayloadPointsBuilder::new(collection.clone(), payload).points_selector(filter))
                    .await;
            }
        }
        Ok(())
    }
}

fn point_id_to_string(id: PointId) -> String {
    match id.point_id_options {
        Some(PointIdOptions::Uuid(s)) => s,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

fn payload_to_json(payload: HashMap<String, qdrant_client::qdrant::Value>) -> serde_json::Value {
    Payload::new_from_hashmap(payload).into()
}
