//! A small seeded demo knowledge base: one multi-chunk runbook (linked by
//! `pre_chunk_id`/`next_chunk_id` so neighbor expansion has something to
//! walk) and one FAQ entry, enough to exercise the full
//! `REWRITE → PARALLEL_SEARCH → RERANK → MERGE → FILTER → STREAM` chain
//! end to end (spec §2).

use std::collections::HashMap;

use rag_core::collaborators::{ChunkRow, FaqMetadata};
use rag_core::model::{ChunkType, IndexEntry};

use super::embedder::HashedEmbedder;
use super::engine::MemoryRow;

pub const DEMO_KB_ID: &str = "demo-kb";
const RUNBOOK_KNOWLEDGE_ID: &str = "k-db-failover";
const FAQ_KNOWLEDGE_ID: &str = "k-support-faq";

pub struct DemoData {
    pub engine_rows: Vec<MemoryRow>,
    pub chunks: Vec<ChunkRow>,
    pub faq: HashMap<String, FaqMetadata>,
    pub generated_questions: HashMap<String, Vec<String>>,
    pub knowledge_titles: HashMap<String, String>,
}

/// Builds the demo dataset, embedding every chunk's content with `embedder`
/// so vector search has real (if hashed) vectors to compare against.
#[must_use]
pub fn build(embedder: &HashedEmbedder) -> DemoData {
    let runbook = [
        (
            "chunk-runbook-summary",
            ChunkType::Summary,
            0i64,
            "Summary: this runbook covers the steps to fail a primary database over to its replica during an \
             incident, including the pre-checks to run before cutting traffic over and how to verify replication \
             caught up afterward.",
            None,
            Some("chunk-runbook-1"),
        ),
        (
            "chunk-runbook-1",
            ChunkType::Text,
            1,
            "Before failing over, confirm the replica's replication lag is under five seconds and that its disk \
             has at least 20% free space. Page the on-call database engineer and announce the failover in the \
             incident channel before touching any traffic routing.",
            Some("chunk-runbook-summary"),
            Some("chunk-runbook-2"),
        ),
        (
            "chunk-runbook-2",
            ChunkType::Text,
            2,
            "Promote the replica with `failover promote`, then update the connection string in the application's \
             configuration and roll the deployment. Once traffic is flowing to the new primary, monitor error \
             rates for ten minutes before declaring the incident resolved.",
            Some("chunk-runbook-1"),
            None,
        ),
    ];

    let mut engine_rows = Vec::new();
    let mut chunks = Vec::new();

    for (chunk_id, chunk_type, seq, content, pre, next) in runbook {
        let embedding = embedder.embed_sync(content);
        engine_rows.push(MemoryRow {
            entry: IndexEntry::new(chunk_id, chunk_id, chunk_id, "text", RUNBOOK_KNOWLEDGE_ID, DEMO_KB_ID, content, embedding),
            knowledge_title: "Database Failover Runbook".to_string(),
            chunk_index: seq,
            start_at: 0,
            end_at: i64::try_from(content.chars().count()).unwrap_or(i64::MAX),
            seq,
            chunk_type,
            parent_chunk_id: None,
            sub_chunk_id: Vec::new(),
            image_info: serde_json::Value::Null,
            chunk_metadata: Vec::new(),
        });
        chunks.push(ChunkRow {
            id: chunk_id.to_string(),
            chunk_id: chunk_id.to_string(),
            knowledge_id: RUNBOOK_KNOWLEDGE_ID.to_string(),
            knowledge_title: "Database Failover Runbook".to_string(),
            content: content.to_string(),
            start_at: 0,
            end_at: i64::try_from(content.chars().count()).unwrap_or(i64::MAX),
            seq,
            chunk_type,
            parent_chunk_id: None,
            pre_chunk_id: pre.map(str::to_string),
            next_chunk_id: next.map(str::to_string),
            image_info: serde_json::Value::Null,
            chunk_metadata: Vec::new(),
        });
    }

    let faq_id = "chunk-faq-cert-rotation";
    let faq_question = "How often do TLS certificates get rotated?";
    let faq_answers = vec!["Every 90 days by default, or immediately after a suspected compromise.".to_string()];
    let faq_content = format!("Q: {faq_question}\nAnswer:\n- {}", faq_answers.join("\n- "));
    let faq_embedding = embedder.embed_sync(&faq_content);
    engine_rows.push(MemoryRow {
        entry: IndexEntry::new(faq_id, faq_id, faq_id, "faq", FAQ_KNOWLEDGE_ID, DEMO_KB_ID, faq_content.clone(), faq_embedding),
        knowledge_title: "Support FAQ".to_string(),
        chunk_index: 0,
        start_at: 0,
        end_at: i64::try_from(faq_content.chars().count()).unwrap_or(i64::MAX),
        seq: 0,
        chunk_type: ChunkType::Faq,
        parent_chunk_id: None,
        sub_chunk_id: Vec::new(),
        image_info: serde_json::Value::Null,
        chunk_metadata: Vec::new(),
    });
    chunks.push(ChunkRow {
        id: faq_id.to_string(),
        chunk_id: faq_id.to_string(),
        knowledge_id: FAQ_KNOWLEDGE_ID.to_string(),
        knowledge_title: "Support FAQ".to_string(),
        content: faq_content.clone(),
        start_at: 0,
        end_at: i64::try_from(faq_content.chars().count()).unwrap_or(i64::MAX),
        seq: 0,
        chunk_type: ChunkType::Faq,
        parent_chunk_id: None,
        pre_chunk_id: None,
        next_chunk_id: None,
        image_info: serde_json::Value::Null,
        chunk_metadata: Vec::new(),
    });

    let mut faq = HashMap::new();
    faq.insert(faq_id.to_string(), FaqMetadata { question: faq_question.to_string(), answers: faq_answers });

    let mut knowledge_titles = HashMap::new();
    knowledge_titles.insert(RUNBOOK_KNOWLEDGE_ID.to_string(), "Database Failover Runbook".to_string());
    knowledge_titles.insert(FAQ_KNOWLEDGE_ID.to_string(), "Support FAQ".to_string());

    DemoData { engine_rows, chunks, faq, generated_questions: HashMap::new(), knowledge_titles }
}
