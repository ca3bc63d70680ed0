//! Table shape for the `embeddings` table (spec §6 "Postgres schema").
//!
//! Columns cover both `IndexEntry` (the storage-side shape) and the
//! `SearchResult` fields every retrieve path must be able to project,
//! since this table is this engine's sole source of truth for both.

pub const DEFAULT_TABLE: &str = "embeddings";

/// DDL an operator runs once per deployment; not executed by this crate
/// (no migration runner is in scope here; `rag-cli` documents running it
/// by hand, the way `main/src/main.rs` leaves SurrealDB schema setup to
/// `surrealdb-migrations` rather than inlining DDL in Rust).
pub const CREATE_TABLE_SQL: &str = r"
CREATE EXTENSION IF NOT EXISTS vector;

CREATE TABLE IF NOT EXISTS embeddings (
    id                  TEXT PRIMARY KEY,
    chunk_id            TEXT NOT NULL,
    source_id           TEXT NOT NULL,
    source_type         TEXT NOT NULL,
    knowledge_id        TEXT NOT NULL,
    knowledge_base_id   TEXT NOT NULL,
    knowledge_title     TEXT NOT NULL DEFAULT '',
    content             TEXT NOT NULL,
    content_tsv         TSVECTOR GENERATED ALWAYS AS (to_tsvector('english', content)) STORED,
    embedding           HALFVEC,
    dimension           INT NOT NULL,
    is_enabled          BOOLEAN,
    chunk_index         BIGINT NOT NULL DEFAULT 0,
    start_at            BIGINT NOT NULL DEFAULT 0,
    end_at              BIGINT NOT NULL DEFAULT 0,
    seq                 BIGINT NOT NULL DEFAULT 0,
    chunk_type          TEXT NOT NULL DEFAULT 'text',
    parent_chunk_id     TEXT,
    sub_chunk_id        TEXT[] NOT NULL DEFAULT '{}',
    image_info          JSONB NOT NULL DEFAULT '[]',
    metadata            JSONB NOT NULL DEFAULT '{}',
    chunk_metadata      BYTEA NOT NULL DEFAULT '\x'
);

CREATE INDEX IF NOT EXISTS embeddings_content_tsv_idx ON embeddings USING GIN (content_tsv);
CREATE INDEX IF NOT EXISTS embeddings_chunk_id_idx ON embeddings (chunk_id);
CREATE INDEX IF NOT EXISTS embeddings_knowledge_id_idx ON embeddings (knowledge_id);
CREATE INDEX IF NOT EXISTS embeddings_knowledge_base_id_idx ON embeddings (knowledge_base_id);
";
