//! Index mapping for the sharded-by-dimension Elasticsearch backend (spec
//! §4.2 "Dimension sharding"; spec §6 only names Postgres/Qdrant schemas
//! explicitly, so this mapping mirrors the `embeddings` table's column set
//! one field at a time).

use serde_json::{json, Value};

pub const DEFAULT_BASE_INDEX: &str = "aiplusall_kb_embeddings";

/// Mapping body for `PUT <index>`: a `dense_vector` field sized to `dim`
/// with cosine similarity (matching the Qdrant/pgvector engines' distance
/// choice), a standard-analyzed `content` field for BM25 keyword search,
/// and keyword/boolean fields for every filter predicate.
#[must_use]
pub fn index_mapping(dim: u32) -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "analysis": {
                "analyzer": {
                    "content_analyzer": {
                        "type": "standard"
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "content": { "type": "text", "analyzer": "content_analyzer" },
                "source_id": { "type": "keyword" },
                "source_type": { "type": "keyword" },
                "chunk_id": { "type": "keyword" },
                "knowledge_id": { "type": "keyword" },
                "knowledge_base_id": { "type": "keyword" },
                "knowledge_title": { "type": "text" },
                "is_enabled": { "type": "boolean" },
                "chunk_index": { "type": "long" },
                "start_at": { "type": "long" },
                "end_at": { "type": "long" },
                "seq": { "type": "long" },
                "chunk_type": { "type": "keyword" },
                "parent_chunk_id": { "type": "keyword" },
                "sub_chunk_id": { "type": "keyword" },
                "embedding": {
                    "type": "dense_vector",
                    "dims": dim,
                    "index": true,
                    "similarity": "cosine"
                }
            }
        }
    })
}
