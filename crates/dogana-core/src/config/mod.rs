mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::error::RouteError;
use crate::orchestrator::RetrievalSettings;
use crate::registry::{Registry, RegistryError};
use crate::vault::{OPENAI_API_KEY, SUPABASE_SERVICE_KEY, VaultProvider};

/// Config file location: explicit path, else `DOGANA_CONFIG`, else
/// `config/default.toml`.
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("DOGANA_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!("{} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Resolve credentials through the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        if let Some(secret) = vault.get_secret(OPENAI_API_KEY).await? {
            self.secrets.openai_api_key = Some(secret);
        }
        if let Some(secret) = vault.get_secret(SUPABASE_SERVICE_KEY).await? {
            self.secrets.supabase_service_key = Some(secret);
        }
        Ok(())
    }

    /// Check that the selected collaborators have what they need to start.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Configuration`] naming the first missing or
    /// invalid setting.
    pub fn validate(&self) -> Result<(), RouteError> {
        let missing = |what: &str| Err(RouteError::Configuration(what.to_owned()));

        if self.secrets.openai_api_key.is_none() {
            return missing(&format!("{OPENAI_API_KEY} is not set"));
        }
        if self.llm.base_url.trim().is_empty() {
            return missing("llm.base_url is empty");
        }
        if self.llm.model.trim().is_empty() || self.llm.embedding_model.trim().is_empty() {
            return missing("llm.model and llm.embedding_model must be set");
        }
        match self.store.backend {
            StoreBackend::Postgrest => {
                if self.store.url.as_deref().is_none_or(|u| u.trim().is_empty()) {
                    return missing("store.url is required for the postgrest backend");
                }
                if self.secrets.supabase_service_key.is_none() {
                    return missing(&format!(
                        "{SUPABASE_SERVICE_KEY} is required for the postgrest backend"
                    ));
                }
            }
            StoreBackend::Sqlite => {
                if self.store.sqlite_path.trim().is_empty() {
                    return missing("store.sqlite_path is required for the sqlite backend");
                }
            }
        }
        for name in [&self.store.chunks_table, &self.store.search_function] {
            if !dogana_store::is_identifier(name) {
                return missing(&format!("{name:?} is not a valid table or function name"));
            }
        }
        if self.retrieval.max_context_chars == 0 {
            return missing("retrieval.max_context_chars must be positive");
        }
        Ok(())
    }

    /// The configured registry file, or the built-in registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry file cannot be loaded or is invalid.
    pub fn load_registry(&self) -> Result<Registry, RegistryError> {
        match &self.registry.path {
            Some(path) => Registry::load(Path::new(path)),
            None => Registry::builtin(),
        }
    }

    /// Routing settings; `top_k_override` (e.g. from the command line) wins over
    /// the configured value. Both are clamped.
    #[must_use]
    pub fn retrieval_settings(&self, top_k_override: Option<usize>) -> RetrievalSettings {
        RetrievalSettings {
            top_k: clamp_top_k(top_k_override.unwrap_or(self.retrieval.top_k)),
            max_context_chars: self.retrieval.max_context_chars,
            classification_category: self.retrieval.classification_category.clone(),
            code_specific_mode: self.retrieval.code_specific_mode,
            eurlex_language: self.sources.eurlex_language.clone(),
            embedding_timeout: Duration::from_secs(self.timeouts.embedding_seconds),
            llm_timeout: Duration::from_secs(self.timeouts.llm_seconds),
            store_timeout: Duration::from_secs(self.timeouts.store_seconds),
        }
    }
}
