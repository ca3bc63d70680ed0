//! Conversions between [`rag_core::model::IndexEntry`] /
//! [`rag_core::model::SearchResult`] and Qdrant point payloads, using the
//! exact payload key strings spec §6 specifies plus the additional
//! `SearchResult` fields (knowledge title, span, chunk type, ...) this
//! engine also needs to round-trip, since Qdrant is this engine's sole
//! source of truth for both the storage- and retrieval-side shapes.

use rag_core::model::{ChunkType, IndexEntry, MatchType, SearchResult};
use rag_engine_core::EngineError;
use serde_json::{json, Value};

pub const KEY_CONTENT: &str = "content";
pub const KEY_SOURCE_ID: &str = "source_id";
pub const KEY_SOURCE_TYPE: &str = "source_type";
pub const KEY_CHUNK_ID: &str = "chunk_id";
pub const KEY_KNOWLEDGE_ID: &str = "knowledge_id";
pub const KEY_KNOWLEDGE_BASE_ID: &str = "knowledge_base_id";
pub const KEY_IS_ENABLED: &str = "is_enabled";
pub const KEY_EMBEDDING: &str = "embedding";

fn chunk_type_str(ct: ChunkType) -> &'static str {
    match ct {
        ChunkType::Text => "text",
        ChunkType::Summary => "summary",
        ChunkType::Faq => "faq",
        ChunkType::Web => "web",
    }
}

fn parse_chunk_type(s: &str) -> ChunkType {
    match s {
        "summary" => ChunkType::Summary,
        "faq" => ChunkType::Faq,
        "web" => ChunkType::Web,
        _ => ChunkType::Text,
    }
}

/// Builds the JSON payload Qdrant stores alongside an entry's vector.
#[must_use]
pub fn entry_to_payload_json(entry: &IndexEntry) -> Value {
    json!({
        KEY_CONTENT: entry.content,
        KEY_SOURCE_ID: entry.source_id,
        KEY_SOURCE_TYPE: entry.source_type,
        KEY_CHUNK_ID: entry.chunk_id,
        KEY_KNOWLEDGE_ID: entry.knowledge_id,
        KEY_KNOWLEDGE_BASE_ID: entry.knowledge_base_id,
        KEY_IS_ENABLED: entry.is_enabled,
        KEY_EMBEDDING: entry.embedding,
        "knowledge_title": "",
        "chunk_index": 0,
        "start_at": 0,
        "end_at": 0,
        "seq": 0,
        "chunk_type": "text",
        "parent_chunk_id": Value::Null,
        "sub_chunk_id": Vec::<String>::new(),
        "image_info": Value::Null,
        "metadata": {},
        "chunk_metadata": Vec::<u8>::new(),
    })
}

/// Reconstructs a [`SearchResult`] from a point's `id`, score, and payload
/// JSON (as decoded from `qdrant_client::Payload`).
pub fn payload_json_to_search_result(
    id: String,
    score: f32,
    match_type: MatchType,
    payload: &Value,
) -> Result<SearchResult, EngineError> {
    let get_str = |key: &str| payload.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let get_i64 = |key: &str| payload.get(key).and_then(Value::as_i64).unwrap_or(0);

    let chunk_type = parse_chunk_type(&get_str("chunk_type"));
    let sub_chunk_id = payload
        .get("sub_chunk_id")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let metadata = payload
        .get("metadata")
        .and_then(Value::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string())).collect())
        .unwrap_or_default();
    let chunk_metadata = payload
        .get("chunk_metadata")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_u64().map(|n| n as u8)).collect())
        .unwrap_or_default();

    Ok(SearchResult {
        id,
        content: get_str(KEY_CONTENT),
        score: SearchResult::sanitized_score(score),
        knowledge_id: get_str(KEY_KNOWLEDGE_ID),
        knowledge_title: get_str("knowledge_title"),
        chunk_index: get_i64("chunk_index"),
        start_at: get_i64("start_at"),
        end_at: get_i64("end_at"),
        seq: get_i64("seq"),
        match_type,
        sub_chunk_id,
        chunk_type,
        parent_chunk_id: payload.get("parent_chunk_id").and_then(Value::as_str).map(str::to_string),
        image_info: payload.get("image_info").cloned().unwrap_or(Value::Null),
        metadata,
        chunk_metadata,
    })
}

#[must_use]
pub fn chunk_type_key(ct: ChunkType) -> &'static str {
    chunk_type_str(ct)
}

#[cfg(test)]
mod tests {
    use super::{entry_to_payload_json, payload_json_to_search_result};
    use rag_core::model::{IndexEntry, MatchType};

    #[test]
    fn entry_round_trips_key_fields() {
        let entry = IndexEntry::new("1", "c1", "c1", "text", "k1", "kb1", "hello world", vec![0.1, 0.2]);
        let payload = entry_to_payload_json(&entry);
        let result = payload_json_to_search_result("1".to_string(), 0.9, MatchType::Vector, &payload).unwrap();
        assert_eq!(result.content, "hello world");
        assert_eq!(result.knowledge_id, "k1");
        assert_eq!(result.score, 0.9);
    }
}
