use std::collections::HashMap;

use pgvector::HalfVector;
use rag_core::model::{ChunkType, IndexEntry, MatchType, SearchResult};
use rag_engine_core::{
    expanded_top_k, CopyIndicesRequest, DeleteIdKind, DeleteRequest, EngineError, RetrievalFilter, RetrieveParams, Scope,
};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{query::Query, PgPool, Postgres, QueryBuilder, Row};

fn parse_chunk_type(s: &str) -> ChunkType {
    match s {
        "summary" => ChunkType::Summary,
        "faq" => ChunkType::Faq,
        "web" => ChunkType::Web,
        _ => ChunkType::Text,
    }
}

/// Appends `AND (...)` predicates for scope + exclusions + the always-on
/// `is_enabled` rule (spec §4.2 "Filter semantics") to a `QueryBuilder`.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &RetrievalFilter) {
    qb.push(" AND (is_enabled IS NULL OR is_enabled = TRUE) ");

    match filter.scope() {
        Scope::None => {}
        Scope::KnowledgeBases(kbs) => {
            qb.push(" AND knowledge_base_id = ANY(");
            qb.push_bind(kbs);
            qb.push(") ");
        }
        Scope::Knowledge(kids) => {
            qb.push(" AND knowledge_id = ANY(");
            qb.push_bind(kids);
            qb.push(") ");
        }
        Scope::Both { knowledge_base_ids, knowledge_ids } => {
            qb.push(" AND knowledge_base_id = ANY(");
            qb.push_bind(knowledge_base_ids);
            qb.push(") AND knowledge_id = ANY(");
            qb.push_bind(knowledge_ids);
            qb.push(") ");
        }
    }

    if !filter.exclude_knowledge_ids.is_empty() {
        qb.push(" AND NOT (knowledge_id = ANY(");
        qb.push_bind(filter.exclude_knowledge_ids.clone());
        qb.push(")) ");
    }
    if !filter.exclude_chunk_ids.is_empty() {
        qb.push(" AND NOT (chunk_id = ANY(");
        qb.push_bind(filter.exclude_chunk_ids.clone());
        qb.push(")) ");
    }
}

fn row_to_search_result(row: &PgRow, score: f32, match_type: MatchType) -> Result<SearchResult, EngineError> {
    let chunk_type_raw: String = row.try_get("chunk_type").map_err(|e| EngineError::Query(e.to_string()))?;
    let metadata_json: serde_json::Value = row.try_get("metadata").map_err(|e| EngineError::Query(e.to_string()))?;
    let metadata: HashMap<String, String> = metadata_json
        .as_object()
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string())).collect())
        .unwrap_or_default();

    Ok(SearchResult {
        id: row.try_get("id").map_err(|e| EngineError::Query(e.to_string()))?,
        content: row.try_get("content").map_err(|e| EngineError::Query(e.to_string()))?,
        score: SearchResult::sanitized_score(score),
        knowledge_id: row.try_get("knowledge_id").map_err(|e| EngineError::Query(e.to_string()))?,
        knowledge_title: row.try_get("knowledge_title").map_err(|e| EngineError::Query(e.to_string()))?,
        chunk_index: row.try_get("chunk_index").map_err(|e| EngineError::Query(e.to_string()))?,
        start_at: row.try_get("start_at").map_err(|e| EngineError::Query(e.to_string()))?,
        end_at: row.try_get("end_at").map_err(|e| EngineError::Query(e.to_string()))?,
        seq: row.try_get("seq").map_err(|e| EngineError::Query(e.to_string()))?,
        match_type,
        sub_chunk_id: row.try_get("sub_chunk_id").map_err(|e| EngineError::Query(e.to_string()))?,
        chunk_type: parse_chunk_type(&chunk_type_raw),
        parent_chunk_id: row.try_get("parent_chunk_id").map_err(|e| EngineError::Query(e.to_string()))?,
        image_info: row.try_get("image_info").map_err(|e| EngineError::Query(e.to_string()))?,
        metadata,
        chunk_metadata: row.try_get("chunk_metadata").map_err(|e| EngineError::Query(e.to_string()))?,
    })
}

fn to_half_vector(embedding: &[f32]) -> HalfVector {
    HalfVector::from(embedding.iter().map(|v| half::f16::from_f32(*v)).collect::<Vec<_>>())
}

pub async fn insert_one(pool: &PgPool, table: &str, entry: &IndexEntry) -> Result<(), EngineError> {
    let vector = to_half_vector(&entry.embedding);

    let sql = format!(
        "INSERT INTO {table} (id, chunk_id, source_id, source_type, knowledge_id, knowledge_base_id, content, embedding, dimension, is_enabled) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (id) DO NOTHING"
    );

    sqlx::query(&sql)
        .bind(&entry.id)
        .bind(&entry.chunk_id)
        .bind(&entry.source_id)
        .bind(&entry.source_type)
        .bind(&entry.knowledge_id)
        .bind(&entry.knowledge_base_id)
        .bind(&entry.content)
        .bind(vector)
        .bind(i32::try_from(entry.dimension).unwrap_or(i32::MAX))
        .bind(entry.is_enabled)
        .execute(pool)
        .await
        .map_err(|e| EngineError::Query(e.to_string()))?;

    Ok(())
}

pub async fn delete_by_ids(pool: &PgPool, table: &str, req: &DeleteRequest) -> Result<(), EngineError> {
    let column = match req.id_kind {
        DeleteIdKind::ChunkId => "chunk_id",
        DeleteIdKind::SourceId => "source_id",
        DeleteIdKind::KnowledgeId => "knowledge_id",
    };
    let sql = format!("DELETE FROM {table} WHERE {column} = ANY($1) AND dimension = $2");
    sqlx::query(&sql)
        .bind(&req.ids)
        .bind(i32::try_from(req.dimension).unwrap_or(i32::MAX))
        .execute(pool)
        .await
        .map_err(|e| EngineError::Query(e.to_string()))?;
    Ok(())
}

/// Standard `tsvector`/`ts_rank_cd` FTS (Open Question decision in
/// `DESIGN.md`: not `paradedb.match`), ordered `score DESC`.
pub async fn keyword_search(pool: &PgPool, table: &str, params: &RetrieveParams) -> Result<Vec<SearchResult>, EngineError> {
    let query_text = params.query_text.as_deref().unwrap_or_default();
    if query_text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT id, content, knowledge_id, knowledge_title, chunk_index, start_at, end_at, seq, \
                sub_chunk_id, chunk_type, parent_chunk_id, image_info, metadata, chunk_metadata, \
                ts_rank_cd(content_tsv, plainto_tsquery('english', "
    ));
    qb.push_bind(query_text.to_string());
    qb.push(")) AS score FROM ");
    qb.push(table);
    qb.push(" WHERE content_tsv @@ plainto_tsquery('english', ");
    qb.push_bind(query_text.to_string());
    qb.push(") ");
    push_filter(&mut qb, &params.filter);
    qb.push(" ORDER BY score DESC LIMIT ");
    qb.push_bind(i64::try_from(params.match_count).unwrap_or(i64::MAX));

    let rows = qb.build().fetch_all(pool).await.map_err(|e| EngineError::Query(e.to_string()))?;

    let threshold = params.keyword_threshold;
    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let score: f32 = row.try_get("score").map_err(|e| EngineError::Query(e.to_string()))?;
        if score < threshold {
            continue;
        }
        out.push(row_to_search_result(row, score, MatchType::Keyword)?);
    }
    Ok(out)
}

/// Builds `AND (...)` scope/exclusion predicates as raw SQL text with
/// sequentially numbered placeholders starting at `*next_idx`, alongside
/// the bind values in the same order. Used by `vector_search`, which
/// (unlike `keyword_search`) must reuse `$1` for the query vector in two
/// places (`QueryBuilder` cannot reuse a placeholder number, since it
/// assigns a fresh one per `push_bind` call).
fn render_filter_predicate(filter: &RetrievalFilter, next_idx: &mut i32) -> (String, Vec<Vec<String>>) {
    let mut sql = String::from(" AND (is_enabled IS NULL OR is_enabled = TRUE) ");
    let mut binds = Vec::new();

    let mut push_any = |sql: &mut String, binds: &mut Vec<Vec<String>>, column: &str, values: Vec<String>, negate: bool, idx: &mut i32| {
        if negate {
            sql.push_str(&format!(" AND NOT ({column} = ANY(${idx}))"));
        } else {
            sql.push_str(&format!(" AND {column} = ANY(${idx})"));
        }
        binds.push(values);
        *idx += 1;
    };

    match filter.scope() {
        Scope::None => {}
        Scope::KnowledgeBases(kbs) => push_any(&mut sql, &mut binds, "knowledge_base_id", kbs, false, &mut *next_idx),
        Scope::Knowledge(kids) => push_any(&mut sql, &mut binds, "knowledge_id", kids, false, &mut *next_idx),
        Scope::Both { knowledge_base_ids, knowledge_ids } => {
            push_any(&mut sql, &mut binds, "knowledge_base_id", knowledge_base_ids, false, &mut *next_idx);
            push_any(&mut sql, &mut binds, "knowledge_id", knowledge_ids, false, &mut *next_idx);
        }
    }
    if !filter.exclude_knowledge_ids.is_empty() {
        push_any(&mut sql, &mut binds, "knowledge_id", filter.exclude_knowledge_ids.clone(), true, &mut *next_idx);
    }
    if !filter.exclude_chunk_ids.is_empty() {
        push_any(&mut sql, &mut binds, "chunk_id", filter.exclude_chunk_ids.clone(), true, &mut *next_idx);
    }

    (sql, binds)
}

fn bind_string_lists<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    binds: Vec<Vec<String>>,
) -> Query<'q, Postgres, PgArguments> {
    for list in binds {
        query = query.bind(list);
    }
    query
}

/// Two-stage query: inner ANN ordering over `embedding::halfvec(dim)` with
/// `LIMIT expanded_top_k`, outer threshold filter with `LIMIT top_k`
/// (spec §4.2). `dim` is interpolated into the SQL text (not bound)
/// because the inner `ORDER BY` expression and the cast must be textually
/// identical for the planner to use the HNSW index; `dim` always
/// originates from the embedder's own configured dimension, never from
/// caller-supplied text.
pub async fn vector_search(pool: &PgPool, table: &str, params: &RetrieveParams) -> Result<Vec<SearchResult>, EngineError> {
    let embedding = params
        .embedding
        .as_ref()
        .ok_or_else(|| EngineError::Query("vector_retrieve called without an embedding".to_string()))?;
    let dim = params.dimension;
    let vector = to_half_vector(embedding);

    let mut next_idx = 2; // $1 is the query vector, reused in SELECT and ORDER BY
    let (filter_sql, filter_binds) = render_filter_predicate(&params.filter, &mut next_idx);
    let limit_idx = next_idx;

    let sql = format!(
        "SELECT id, content, knowledge_id, knowledge_title, chunk_index, start_at, end_at, seq, \
                sub_chunk_id, chunk_type, parent_chunk_id, image_info, metadata, chunk_metadata, \
                1 - (embedding::halfvec({dim}) <=> $1::halfvec({dim})) AS score \
         FROM {table} WHERE TRUE {filter_sql} \
         ORDER BY embedding::halfvec({dim}) <=> $1::halfvec({dim}) LIMIT ${limit_idx}"
    );

    let mut query = sqlx::query(&sql).bind(vector);
    query = bind_string_lists(query, filter_binds);
    query = query.bind(i64::try_from(expanded_top_k(params.match_count)).unwrap_or(i64::MAX));

    let inner_rows = query.fetch_all(pool).await.map_err(|e| EngineError::Query(e.to_string()))?;

    let threshold = params.vector_threshold;
    let mut scored: Vec<(f32, &PgRow)> = Vec::with_capacity(inner_rows.len());
    for row in &inner_rows {
        let score: f32 = row.try_get("score").map_err(|e| EngineError::Query(e.to_string()))?;
        if score >= threshold {
            scored.push((score, row));
        }
    }
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(params.match_count);

    scored.into_iter().map(|(score, row)| row_to_search_result(row, score, MatchType::Vector)).collect()
}

pub async fn copy_indices(
    pool: &PgPool,
    table: &str,
    req: &CopyIndicesRequest,
    rewrite_source_id: impl Fn(&str, &str, &str) -> String,
) -> Result<u64, EngineError> {
    let sql = format!(
        "SELECT chunk_id, source_id, source_type, knowledge_id, content, \
                embedding, dimension, is_enabled FROM {table} WHERE knowledge_base_id = $1 AND dimension = $2"
    );
    let rows = sqlx::query(&sql)
        .bind(&req.src_knowledge_base_id)
        .bind(i32::try_from(req.dimension).unwrap_or(i32::MAX))
        .fetch_all(pool)
        .await
        .map_err(|e| EngineError::Query(e.to_string()))?;

    let mut copied: u64 = 0;
    for chunk in rows.chunks(req.batch_size.max(1)) {
        for row in chunk {
            let chunk_id: String = row.try_get("chunk_id").map_err(|e| EngineError::Query(e.to_string()))?;
            let source_id: String = row.try_get("source_id").map_err(|e| EngineError::Query(e.to_string()))?;
            let knowledge_id: String = row.try_get("knowledge_id").map_err(|e| EngineError::Query(e.to_string()))?;

            let Some(target_chunk) = req.chunk_id_map.get(&chunk_id) else { continue };
            let Some(target_knowledge) = req.knowledge_id_map.get(&knowledge_id) else { continue };
            let new_source_id = rewrite_source_id(&source_id, &chunk_id, target_chunk);
            let new_id = format!("{new_source_id}:{}", req.dst_knowledge_base_id);

            let content: String = row.try_get("content").map_err(|e| EngineError::Query(e.to_string()))?;
            let source_type: String = row.try_get("source_type").map_err(|e| EngineError::Query(e.to_string()))?;
            let dimension: i32 = row.try_get("dimension").map_err(|e| EngineError::Query(e.to_string()))?;
            let is_enabled: Option<bool> = row.try_get("is_enabled").map_err(|e| EngineError::Query(e.to_string()))?;
            let embedding: HalfVector = row.try_get("embedding").map_err(|e| EngineError::Query(e.to_string()))?;

            let insert_sql = format!(
                "INSERT INTO {table} (id, chunk_id, source_id, source_type, knowledge_id, knowledge_base_id, content, embedding, dimension, is_enabled) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) ON CONFLICT (id) DO NOTHING"
            );
            sqlx::query(&insert_sql)
                .bind(&new_id)
                .bind(target_chunk)
                .bind(&new_source_id)
                .bind(&source_type)
                .bind(target_knowledge)
                .bind(&req.dst_knowledge_base_id)
                .bind(&content)
                .bind(embedding)
                .bind(dimension)
                .bind(is_enabled)
                .execute(pool)
                .await
                .map_err(|e| EngineError::Query(e.to_string()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

pub async fn batch_update_chunk_enabled(pool: &PgPool, table: &str, updates: &HashMap<String, bool>) -> Result<(), EngineError> {
    for (chunk_id, enabled) in updates {
        let sql = format!("UPDATE {table} SET is_enabled = $1 WHERE chunk_id = $2");
        sqlx::query(&sql)
            .bind(enabled)
            .bind(chunk_id)
            .execute(pool)
            .await
            .map_err(|e| EngineError::Query(e.to_string()))?;
    }
    Ok(())
}
