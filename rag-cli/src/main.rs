//! A thin demonstration binary wiring the retrieval/rerank/pipeline crates
//! together end to end against an in-memory, seeded knowledge base
//! (SPEC_FULL §A): it does not implement HTTP routing, auth, or tenant CRUD
//! (spec §1 Non-goals), only enough to drive one request through
//! `REWRITE → PARALLEL_SEARCH → RERANK → MERGE → FILTER → STREAM` and print
//! the streamed answer.

mod config;
mod stubs;

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use rag_core::collaborators::{ChatModel, ChunkRepository, Embedder, GraphRepository, KnowledgeRepository, Reranker};
use rag_core::model::chat_context::{ChatContext, SearchTarget, TargetKind};
use rag_core::model::{EventBusHandle, StreamEventKind};
use rag_coordinator::Coordinator;
use rag_engine_core::RetrievalEngine;
use rag_eventbus::{with_logging, EventBus};
use rag_pipeline::Pipeline;
use rag_rerank::RerankerPool;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stubs::{CannedChatModel, HashedEmbedder, InMemoryChunkRepository, InMemoryGraphRepository, InMemoryKnowledgeRepository, InMemoryEngine};

/// Hashed-embedding dimension for the demo; arbitrary since `HashedEmbedder`
/// has no real model to match, but must stay fixed once data has been
/// seeded with it.
const DEMO_EMBEDDING_DIMENSION: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "rag-cli", about = "Local exerciser for the retrieval-augmented chat pipeline")]
struct Cli {
    /// The question to ask; defaults to a question the seeded demo
    /// knowledge base can answer.
    #[arg(long)]
    query: Option<String>,

    /// Print per-stage timing diagnostics after the answer streams
    /// (SPEC_FULL §C.2).
    #[arg(long)]
    show_timings: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(EnvFilter::from_default_env()).try_init().ok();

    let cli = Cli::parse();
    let cfg = config::get_config()?;

    let embedder = Arc::new(HashedEmbedder::new(DEMO_EMBEDDING_DIMENSION));
    let demo = stubs::seed::build(&embedder);

    let engine: Arc<dyn RetrievalEngine> = Arc::new(InMemoryEngine::new(demo.engine_rows));
    let chunks: Arc<dyn ChunkRepository> = Arc::new(InMemoryChunkRepository::new(demo.chunks, demo.faq, demo.generated_questions));
    let knowledge: Arc<dyn KnowledgeRepository> = Arc::new(InMemoryKnowledgeRepository::new(demo.knowledge_titles));
    let graph: Arc<dyn GraphRepository> = Arc::new(InMemoryGraphRepository);
    let embedder: Arc<dyn Embedder> = embedder;

    let coordinator = Coordinator::new(vec![engine], Arc::clone(&chunks), knowledge, graph, embedder);

    let reranker: Option<Arc<dyn Reranker>> = if cfg.enable_reranker {
        match RerankerPool::new(cfg.reranker_pool_size, cfg.reranker_cache_dir.clone()) {
            Ok(pool) => Some(Arc::new(pool)),
            Err(e) => {
                warn!(error = %e, "failed to load reranker pool; continuing without reranking");
                None
            }
        }
    } else {
        None
    };

    let chat_model: Arc<dyn ChatModel> = Arc::new(CannedChatModel);
    let manager = rag_pipeline::build_manager(Arc::clone(&chat_model), coordinator, reranker, Arc::clone(&chunks));
    let pipeline = Pipeline::new(manager);

    let query = cli.query.unwrap_or_else(|| "How often should certificates be rotated?".to_string());

    let mut ctx = ChatContext::new(cfg.session_id.clone(), cfg.tenant_id.clone(), query);
    ctx.search_targets = vec![SearchTarget { kb_id: cfg.knowledge_base_id.clone(), kind: TargetKind::Kb, knowledge_ids: Vec::new() }];
    ctx.embedding_top_k = cfg.embedding_top_k;
    ctx.rerank_top_k = cfg.rerank_top_k;
    ctx.rerank_threshold = cfg.rerank_threshold;
    ctx.enable_rewrite = cfg.enable_rewrite;
    ctx.fallback_response = cfg.fallback_response.clone();
    ctx.no_match_prefix = cfg.no_match_prefix.clone();

    let bus = EventBus::new();
    bus.use_middleware(with_logging()).await;

    let (done_tx, mut done_rx) = tokio::sync::mpsc::channel::<()>(1);

    let answer_tx = done_tx.clone();
    bus.on(StreamEventKind::FinalAnswer, move |event| {
        let answer_tx = answer_tx.clone();
        async move {
            print!("{}", event.content);
            let _ = std::io::stdout().flush();
            if event.done {
                println!();
                let _ = answer_tx.send(()).await;
            }
        }
    })
    .await;

    let error_tx = done_tx.clone();
    bus.on(StreamEventKind::Error, move |event| {
        let error_tx = error_tx.clone();
        async move {
            eprintln!("\nerror: {}", event.content);
            let _ = error_tx.send(()).await;
        }
    })
    .await;

    drop(done_tx);
    let bus_handle: Arc<dyn EventBusHandle> = bus;
    ctx.event_bus = Some(bus_handle);

    let timings = pipeline.run(&mut ctx).await?;
    done_rx.recv().await;

    if cli.show_timings {
        for (kind, duration) in timings.into_vec() {
            info!(stage = ?kind, elapsed_ms = duration.as_millis(), "stage timing");
        }
    }

    Ok(())
}
