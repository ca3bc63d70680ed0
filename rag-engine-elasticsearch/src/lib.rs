//! Elasticsearch `RetrievalEngine` implementation, dual `elasticsearch_v7`/
//! `elasticsearch_v8` (spec §6 `RETRIEVE_DRIVER`), sharded by embedding
//! dimension the same way as the Qdrant engine since `dense_vector` fields
//! are sized at mapping time and can't be widened in place.

mod query;
mod schema;

pub use schema::DEFAULT_BASE_INDEX;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use elasticsearch::indices::{IndicesCreateParts, IndicesExistsParts};
use elasticsearch::Elasticsearch;
use rag_core::model::{IndexEntry, SearchResult};
use rag_engine_core::{
    dimension::{sharded_name, ShardRegistry},
    engine::{Capabilities, CopyIndicesRequest, DeleteRequest, EngineType, RetrievalEngine, RetrieveParams},
    error::EngineError,
};
use tracing::instrument;

/// An Elasticsearch-backed engine. `variant` picks which query shape
/// `vector_search` builds (native `knn` on v8, `script_score` on v7);
/// everything else is shared.
pub struct ElasticsearchEngine {
    client: Elasticsearch,
    base_index: String,
    variant: EngineType,
    registry: Arc<ShardRegistry>,
}

impl ElasticsearchEngine {
    #[must_use]
    pub fn new(client: Elasticsearch, variant: EngineType) -> Self {
        Self { client, base_index: DEFAULT_BASE_INDEX.to_string(), variant, registry: Arc::new(ShardRegistry::new()) }
    }

    #[must_use]
    pub fn with_base_index(mut self, base_index: impl Into<String>) -> Self {
        self.base_index = base_index.into();
        self
    }

    fn index_name(&self, dim: u32) -> String {
        sharded_name(&self.base_index, dim)
    }

    #[instrument(skip(self))]
    async fn ensure_index(&self, dim: u32) -> Result<(), EngineError> {
        let name = self.index_name(dim);
        if self.registry.is_initialized(&self.base_index, dim) {
            return Ok(());
        }

        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[&name]))
            .send()
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?
            .status_code()
            .is_success();

        if exists {
            self.registry.mark_initialized(&self.base_index, dim);
            return Ok(());
        }

        if !self.registry.mark_initialized(&self.base_index, dim) {
            return Ok(());
        }

        self.client
            .indices()
            .create(IndicesCreateParts::Index(&name))
            .body(schema::index_mapping(dim))
            .send()
            .await
            .map_err(|e| EngineError::Connection(format!("create index {name}: {e}")))?
            .error_for_status_code()
            .map_err(|e| EngineError::Connection(format!("create index {name}: {e}")))?;

        tracing::info!(index = %name, dim, "created elasticsearch index");
        Ok(())
    }
}

#[async_trait]
impl RetrievalEngine for ElasticsearchEngine {
    fn engine_type(&self) -> EngineType {
        self.variant
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { keyword: true, vector: true }
    }

    #[instrument(skip(self, entry), fields(id = %entry.id))]
    async fn save(&self, entry: &IndexEntry) -> Result<(), EngineError> {
        self.ensure_index(entry.dimension).await?;
        query::index_one(&self.client, &self.index_name(entry.dimension), entry).await
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn batch_save(&self, entries: &[IndexEntry]) -> Result<(), EngineError> {
        let mut by_dim: HashMap<u32, Vec<IndexEntry>> = HashMap::new();
        for entry in entries {
            self.ensure_index(entry.dimension).await?;
            by_dim.entry(entry.dimension).or_default().push(entry.clone());
        }
        for (dim, group) in by_dim {
            query::bulk_index(&self.client, &self.index_name(dim), &group).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, req))]
    async fn delete(&self, req: &DeleteRequest) -> Result<(), EngineError> {
        query::delete_by_ids(&self.client, &self.index_name(req.dimension), req).await
    }

    #[instrument(skip(self, params))]
    async fn keywords_retrieve(&self, params: &RetrieveParams) -> Result<Vec<SearchResult>, EngineError> {
        query::keyword_search(&self.client, &self.index_name(params.dimension), params).await
    }

    #[instrument(skip(self, params))]
    async fn vector_retrieve(&self, params: &RetrieveParams) -> Result<Vec<SearchResult>, EngineError> {
        if params.match_count == 0 {
            return Ok(Vec::new());
        }
        query::vector_search(&self.client, &self.index_name(params.dimension), params, self.variant).await
    }

    #[instrument(skip(self, req))]
    async fn copy_indices(&self, req: &CopyIndicesRequest) -> Result<u64, EngineError> {
        self.ensure_index(req.dimension).await?;
        query::copy_indices(
            &self.client,
            &self.index_name(req.dimension),
            req,
            rag_engine_core::engine::rewrite_source_id,
        )
        .await
    }

    #[instrument(skip(self, updates), fields(count = updates.len()))]
    async fn batch_update_chunk_enabled(&self, updates: &HashMap<String, bool>) -> Result<(), EngineError> {
        for name in self.registry.known_names(&self.base_index) {
            query::batch_update_chunk_enabled(&self.client, &name, updates).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_name_is_sharded_by_dimension() {
        let engine_index = sharded_name(DEFAULT_BASE_INDEX, 768);
        assert_eq!(engine_index, format!("{DEFAULT_BASE_INDEX}_768"));
    }

    #[test]
    fn v7_and_v8_are_distinct_engine_types() {
        assert_ne!(EngineType::ElasticsearchV7, EngineType::ElasticsearchV8);
    }
}
