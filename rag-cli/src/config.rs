//! CLI tuning configuration (SPEC_FULL §B): env + optional file, following
//! `common::utils::config`'s shape: typed fields with `#[serde(default =
//! "...")]` helpers and one `get_config()` entrypoint.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_session_id")]
    pub session_id: String,
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
    #[serde(default = "default_kb_id")]
    pub knowledge_base_id: String,
    #[serde(default = "default_embedding_top_k")]
    pub embedding_top_k: usize,
    #[serde(default = "default_rerank_top_k")]
    pub rerank_top_k: usize,
    #[serde(default = "default_rerank_threshold")]
    pub rerank_threshold: f32,
    /// Loads a real `fastembed` cross-encoder pool if set; off by default
    /// so the demo runs with no model download (the rerank plugin degrades
    /// gracefully to pre-rerank ordering per SPEC_FULL §C.4 either way).
    #[serde(default)]
    pub enable_reranker: bool,
    #[serde(default = "default_reranker_pool_size")]
    pub reranker_pool_size: usize,
    #[serde(default = "default_reranker_cache_dir")]
    pub reranker_cache_dir: String,
    #[serde(default = "default_enable_rewrite")]
    pub enable_rewrite: bool,
    #[serde(default = "default_fallback_response")]
    pub fallback_response: String,
    #[serde(default)]
    pub no_match_prefix: Option<String>,
}

fn default_session_id() -> String {
    "demo-session".to_string()
}

fn default_tenant_id() -> String {
    "demo-tenant".to_string()
}

fn default_kb_id() -> String {
    "demo-kb".to_string()
}

fn default_embedding_top_k() -> usize {
    20
}

fn default_rerank_top_k() -> usize {
    5
}

fn default_rerank_threshold() -> f32 {
    0.5
}

fn default_reranker_pool_size() -> usize {
    1
}

fn default_reranker_cache_dir() -> String {
    "./.cache/rerank-models".to_string()
}

fn default_enable_rewrite() -> bool {
    true
}

fn default_fallback_response() -> String {
    "Sorry, I couldn't find anything relevant to that.".to_string()
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("rag-cli").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
