use super::{Config, StoreBackend};
use crate::orchestrator::CodeSpecificMode;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DOGANA_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("DOGANA_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("DOGANA_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("DOGANA_STORE_BACKEND") {
            if let Ok(backend) = serde_json::from_value::<StoreBackend>(serde_json::Value::String(
                v.to_lowercase(),
            )) {
                self.store.backend = backend;
            } else {
                tracing::warn!("ignoring invalid DOGANA_STORE_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOGANA_STORE_URL") {
            self.store.url = Some(v);
        }
        if let Ok(v) = std::env::var("DOGANA_SQLITE_PATH") {
            self.store.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("DOGANA_TOP_K") {
            match v.parse::<usize>() {
                Ok(top_k) => self.retrieval.top_k = top_k,
                Err(_) => tracing::warn!("ignoring invalid DOGANA_TOP_K value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("DOGANA_MAX_CONTEXT_CHARS")
            && let Ok(chars) = v.parse::<usize>()
        {
            self.retrieval.max_context_chars = chars;
        }
        if let Ok(v) = std::env::var("DOGANA_REGISTRY_PATH") {
            self.registry.path = Some(v);
        }
        if let Ok(v) = std::env::var("DOGANA_CODE_SPECIFIC_MODE") {
            if let Ok(mode) = serde_json::from_value::<CodeSpecificMode>(
                serde_json::Value::String(v.to_lowercase()),
            ) {
                self.retrieval.code_specific_mode = mode;
            } else {
                tracing::warn!("ignoring invalid DOGANA_CODE_SPECIFIC_MODE value: {v}");
            }
        }
    }
}
