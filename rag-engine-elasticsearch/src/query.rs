use std::collections::HashMap;

use elasticsearch::{
    BulkParts, DeleteByQueryParts, Elasticsearch, IndexParts, SearchParts, UpdateByQueryParts,
};
use rag_core::model::{ChunkType, IndexEntry, MatchType, SearchResult};
use rag_engine_core::{
    expanded_top_k, CopyIndicesRequest, DeleteIdKind, DeleteRequest, EngineError, EngineType, RetrievalFilter,
    RetrieveParams, Scope,
};
use serde_json::{json, Value};

fn parse_chunk_type(s: &str) -> ChunkType {
    match s {
        "summary" => ChunkType::Summary,
        "faq" => ChunkType::Faq,
        "web" => ChunkType::Web,
        _ => ChunkType::Text,
    }
}

/// Builds the `bool` query's `filter`/`must_not` clauses for scope,
/// exclusions, and the always-on `is_enabled` rule (spec §4.2 "Filter
/// semantics"), in the same shape across keyword and vector queries.
fn filter_clauses(filter: &RetrievalFilter) -> (Vec<Value>, Vec<Value>) {
    let mut must = vec![json!({ "term": { "is_enabled": true } })];
    match filter.scope() {
        Scope::None => {}
        Scope::KnowledgeBases(kbs) => must.push(json!({ "terms": { "knowledge_base_id": kbs } })),
        Scope::Knowledge(kids) => must.push(json!({ "terms": { "knowledge_id": kids } })),
        Scope::Both { knowledge_base_ids, knowledge_ids } => {
            must.push(json!({ "terms": { "knowledge_base_id": knowledge_base_ids } }));
            must.push(json!({ "terms": { "knowledge_id": knowledge_ids } }));
        }
    }

    let mut must_not = Vec::new();
    if !filter.exclude_knowledge_ids.is_empty() {
        must_not.push(json!({ "terms": { "knowledge_id": filter.exclude_knowledge_ids } }));
    }
    if !filter.exclude_chunk_ids.is_empty() {
        must_not.push(json!({ "terms": { "chunk_id": filter.exclude_chunk_ids } }));
    }
    (must, must_not)
}

fn doc_to_search_result(id: String, score: f32, match_type: MatchType, source: &Value) -> Result<SearchResult, EngineError> {
    let get_str = |key: &str| source.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let get_i64 = |key: &str| source.get(key).and_then(Value::as_i64).unwrap_or(0);
    let chunk_type = parse_chunk_type(&get_str("chunk_type"));

    let sub_chunk_id = source
        .get("sub_chunk_id")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let metadata: HashMap<String, String> = source
        .get("metadata")
        .and_then(Value::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string())).collect())
        .unwrap_or_default();
    let chunk_metadata = source
        .get("chunk_metadata")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_u64().map(|n| n as u8)).collect())
        .unwrap_or_default();

    Ok(SearchResult {
        id,
        content: get_str("content"),
        score: SearchResult::sanitized_score(score),
        knowledge_id: get_str("knowledge_id"),
        knowledge_title: get_str("knowledge_title"),
        chunk_index: get_i64("chunk_index"),
        start_at: get_i64("start_at"),
        end_at: get_i64("end_at"),
        seq: get_i64("seq"),
        match_type,
        sub_chunk_id,
        chunk_type,
        parent_chunk_id: source.get("parent_chunk_id").and_then(Value::as_str).map(str::to_string),
        image_info: source.get("image_info").cloned().unwrap_or(Value::Null),
        metadata,
        chunk_metadata,
    })
}

fn entry_to_doc(entry: &IndexEntry) -> Value {
    json!({
        "content": entry.content,
        "source_id": entry.source_id,
        "source_type": entry.source_type,
        "chunk_id": entry.chunk_id,
        "knowledge_id": entry.knowledge_id,
        "knowledge_base_id": entry.knowledge_base_id,
        "is_enabled": entry.is_enabled.unwrap_or(true),
        "embedding": entry.embedding,
        "knowledge_title": "",
        "chunk_index": 0,
        "start_at": 0,
        "end_at": 0,
        "seq": 0,
        "chunk_type": "text",
        "sub_chunk_id": Vec::<String>::new(),
        "metadata": {},
        "image_info": Value::Null,
        "chunk_metadata": Vec::<u8>::new(),
    })
}

pub async fn index_one(client: &Elasticsearch, index: &str, entry: &IndexEntry) -> Result<(), EngineError> {
    client
        .index(IndexParts::IndexId(index, &entry.id))
        .body(entry_to_doc(entry))
        .send()
        .await
        .map_err(|e| EngineError::Connection(e.to_string()))?
        .error_for_status_code()
        .map_err(|e| EngineError::Query(e.to_string()))?;
    Ok(())
}

/// Bulk index via the `_bulk` API's NDJSON-shaped body (alternating action
/// and source lines), the standard way to batch writes against
/// Elasticsearch rather than looping individual `index` calls.
pub async fn bulk_index(client: &Elasticsearch, index: &str, entries: &[IndexEntry]) -> Result<(), EngineError> {
    if entries.is_empty() {
        return Ok(());
    }

    let mut body: Vec<elasticsearch::http::request::JsonBody<Value>> = Vec::with_capacity(entries.len() * 2);
    for entry in entries {
        body.push(json!({ "index": { "_index": index, "_id": entry.id } }).into());
        body.push(entry_to_doc(entry).into());
    }

    let response = client
        .bulk(BulkParts::None)
        .body(body)
        .send()
        .await
        .map_err(|e| EngineError::Connection(e.to_string()))?;
    response.error_for_status_code().map_err(|e| EngineError::Query(e.to_string()))?;
    Ok(())
}

pub async fn delete_by_ids(client: &Elasticsearch, index: &str, req: &DeleteRequest) -> Result<(), EngineError> {
    let field = match req.id_kind {
        DeleteIdKind::ChunkId => "chunk_id",
        DeleteIdKind::SourceId => "source_id",
        DeleteIdKind::KnowledgeId => "knowledge_id",
    };
    let query = json!({ "query": { "terms": { field: req.ids } } });
    client
        .delete_by_query(DeleteByQueryParts::Index(&[index]))
        .body(query)
        .send()
        .await
        .map_err(|e| EngineError::Connection(e.to_string()))?
        .error_for_status_code()
        .map_err(|e| EngineError::Query(e.to_string()))?;
    Ok(())
}

/// BM25 `match` query against `content`, `min_score` applied as the keyword
/// threshold, ordered by ES's default `_score DESC`.
pub async fn keyword_search(client: &Elasticsearch, index: &str, params: &RetrieveParams) -> Result<Vec<SearchResult>, EngineError> {
    let query_text = params.query_text.as_deref().unwrap_or_default();
    if query_text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let (must, must_not) = filter_clauses(&params.filter);
    let mut bool_query = must;
    bool_query.push(json!({ "match": { "content": query_text } }));

    let body = json!({
        "min_score": params.keyword_threshold,
        "size": params.match_count,
        "query": {
            "bool": {
                "must": bool_query,
                "must_not": must_not
            }
        }
    });

    run_search(client, index, body, MatchType::Keyword).await
}

/// Vector search. ES8's native `knn` clause is used when the cluster
/// supports it; ES7 has no kNN query stage, so the same ranking is
/// expressed as a `script_score` over `cosineSimilarity`, matching the
/// teacher's pattern of dispatching per-driver inside one code path rather
/// than maintaining two engine structs (spec §6 `elasticsearch_v7`/
/// `elasticsearch_v8`).
pub async fn vector_search(
    client: &Elasticsearch,
    index: &str,
    params: &RetrieveParams,
    variant: EngineType,
) -> Result<Vec<SearchResult>, EngineError> {
    let embedding = params
        .embedding
        .as_ref()
        .ok_or_else(|| EngineError::Query("vector_retrieve called without an embedding".to_string()))?;
    let (must, must_not) = filter_clauses(&params.filter);
    let filter_query = json!({ "bool": { "must": must.clone(), "must_not": must_not.clone() } });

    let body = match variant {
        EngineType::ElasticsearchV8 => json!({
            "size": params.match_count,
            "knn": {
                "field": "embedding",
                "query_vector": embedding,
                "k": expanded_top_k(params.match_count),
                "num_candidates": expanded_top_k(params.match_count) * 2,
                "filter": filter_query
            }
        }),
        _ => json!({
            "size": expanded_top_k(params.match_count),
            "query": {
                "script_score": {
                    "query": filter_query,
                    "script": {
                        "source": "cosineSimilarity(params.query_vector, 'embedding') + 1.0",
                        "params": { "query_vector": embedding }
                    }
                }
            }
        }),
    };

    let mut results = run_search(client, index, body, MatchType::Vector).await?;
    results.retain(|r| r.score >= params.vector_threshold);
    results.truncate(params.match_count);
    Ok(results)
}

async fn run_search(client: &Elasticsearch, index: &str, body: Value, match_type: MatchType) -> Result<Vec<SearchResult>, EngineError> {
    let response = client
        .search(SearchParts::Index(&[index]))
        .body(body)
        .send()
        .await
        .map_err(|e| EngineError::Connection(e.to_string()))?;
    let response = response.error_for_status_code().map_err(|e| EngineError::Query(e.to_string()))?;
    let payload: Value = response.json().await.map_err(|e| EngineError::Query(e.to_string()))?;

    let hits = payload["hits"]["hits"].as_array().cloned().unwrap_or_default();
    let mut out = Vec::with_capacity(hits.len());
    for hit in hits {
        let id = hit["_id"].as_str().unwrap_or_default().to_string();
        let score = hit["_score"].as_f64().unwrap_or(0.0) as f32;
        let source = hit["_source"].clone();
        out.push(doc_to_search_result(id, score, match_type, &source)?);
    }
    Ok(out)
}

pub async fn copy_indices(
    client: &Elasticsearch,
    index: &str,
    req: &CopyIndicesRequest,
    rewrite_source_id: impl Fn(&str, &str, &str) -> String,
) -> Result<u64, EngineError> {
    let body = json!({
        "size": req.batch_size,
        "query": { "term": { "knowledge_base_id": req.src_knowledge_base_id } }
    });

    let response = client
        .search(SearchParts::Index(&[index]))
        .scroll("2m")
        .body(body)
        .send()
        .await
        .map_err(|e| EngineError::Connection(e.to_string()))?;
    let mut payload: Value = response.json().await.map_err(|e| EngineError::Query(e.to_string()))?;

    let mut copied: u64 = 0;
    loop {
        let hits = payload["hits"]["hits"].as_array().cloned().unwrap_or_default();
        if hits.is_empty() {
            break;
        }

        let mut body: Vec<elasticsearch::http::request::JsonBody<Value>> = Vec::with_capacity(hits.len() * 2);
        for hit in &hits {
            let mut source = hit["_source"].clone();
            let chunk_id = source.get("chunk_id").and_then(Value::as_str).unwrap_or_default().to_string();
            let source_id = source.get("source_id").and_then(Value::as_str).unwrap_or_default().to_string();
            let knowledge_id = source.get("knowledge_id").and_then(Value::as_str).unwrap_or_default().to_string();

            let Some(target_chunk) = req.chunk_id_map.get(&chunk_id) else { continue };
            let Some(target_knowledge) = req.knowledge_id_map.get(&knowledge_id) else { continue };
            let new_source_id = rewrite_source_id(&source_id, &chunk_id, target_chunk);

            if let Value::Object(map) = &mut source {
                map.insert("chunk_id".to_string(), json!(target_chunk));
                map.insert("knowledge_id".to_string(), json!(target_knowledge));
                map.insert("knowledge_base_id".to_string(), json!(req.dst_knowledge_base_id));
                map.insert("source_id".to_string(), json!(new_source_id));
            }

            let new_id = format!("{new_source_id}:{}", req.dst_knowledge_base_id);
            body.push(json!({ "index": { "_index": index, "_id": new_id } }).into());
            body.push(source.into());
            copied += 1;
        }

        if !body.is_empty() {
            client
                .bulk(BulkParts::None)
                .body(body)
                .send()
                .await
                .map_err(|e| EngineError::Connection(e.to_string()))?
                .error_for_status_code()
                .map_err(|e| EngineError::Query(e.to_string()))?;
        }

        let Some(scroll_id) = payload["_scroll_id"].as_str().map(str::to_string) else { break };
        let next = client
            .scroll(elasticsearch::ScrollParts::None)
            .body(json!({ "scroll": "2m", "scroll_id": scroll_id }))
            .send()
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?;
        payload = next.json().await.map_err(|e| EngineError::Query(e.to_string()))?;
    }

    Ok(copied)
}

pub async fn batch_update_chunk_enabled(client: &Elasticsearch, index: &str, updates: &HashMap<String, bool>) -> Result<(), EngineError> {
    for (chunk_id, enabled) in updates {
        let body = json!({
            "query": { "term": { "chunk_id": chunk_id } },
            "script": {
                "source": "ctx._source.is_enabled = params.enabled",
                "params": { "enabled": enabled }
            }
        });
        client
            .update_by_query(UpdateByQueryParts::Index(&[index]))
            .body(body)
            .send()
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?
            .error_for_status_code()
            .map_err(|e| EngineError::Query(e.to_string()))?;
    }
    Ok(())
}
