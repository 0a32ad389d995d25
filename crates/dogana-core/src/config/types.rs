use serde::Deserialize;

use crate::attribution::DEFAULT_EURLEX_LANGUAGE;
use crate::orchestrator::CodeSpecificMode;
use crate::vault::Secret;

pub const TOP_K_MIN: usize = 5;
pub const TOP_K_MAX: usize = 20;

/// Keep a requested result count inside the admissible range.
#[must_use]
pub fn clamp_top_k(top_k: usize) -> usize {
    top_k.clamp(TOP_K_MIN, TOP_K_MAX)
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".into()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            embedding_model: default_embedding_model(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgrest,
    Sqlite,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Supabase project URL for the PostgREST backend.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default = "default_chunks_table")]
    pub chunks_table: String,
    #[serde(default = "default_search_function")]
    pub search_function: String,
}

fn default_sqlite_path() -> String {
    "data/dogana.db".into()
}

fn default_chunks_table() -> String {
    "chunks".into()
}

fn default_search_function() -> String {
    "search_chunks_multi_type".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: None,
            sqlite_path: default_sqlite_path(),
            chunks_table: default_chunks_table(),
            search_function: default_search_function(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RetrievalConfig {
    /// Clamped to `[TOP_K_MIN, TOP_K_MAX]` when used.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_classification_category")]
    pub classification_category: String,
    #[serde(default)]
    pub code_specific_mode: CodeSpecificMode,
}

fn default_top_k() -> usize {
    15
}

fn default_max_context_chars() -> usize {
    30_000
}

fn default_classification_category() -> String {
    "ANNEX_CODE".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
            classification_category: default_classification_category(),
            code_specific_mode: CodeSpecificMode::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RegistryConfig {
    /// TOML file replacing the built-in registry.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_eurlex_language")]
    pub eurlex_language: String,
}

fn default_eurlex_language() -> String {
    DEFAULT_EURLEX_LANGUAGE.into()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            eurlex_language: default_eurlex_language(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_llm_timeout")]
    pub llm_seconds: u64,
    #[serde(default = "default_embedding_timeout")]
    pub embedding_seconds: u64,
    #[serde(default = "default_store_timeout")]
    pub store_seconds: u64,
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_store_timeout() -> u64 {
    30
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_seconds: default_llm_timeout(),
            embedding_seconds: default_embedding_timeout(),
            store_seconds: default_store_timeout(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
    pub supabase_service_key: Option<Secret>,
}
