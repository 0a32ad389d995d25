use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serial_test::serial;

use super::*;
use crate::error::RouteError;
use crate::orchestrator::CodeSpecificMode;
use crate::vault::Secret;

const ENV_KEYS: [&str; 12] = [
    "DOGANA_CONFIG",
    "DOGANA_LLM_BASE_URL",
    "DOGANA_LLM_MODEL",
    "DOGANA_LLM_EMBEDDING_MODEL",
    "DOGANA_STORE_BACKEND",
    "DOGANA_STORE_URL",
    "DOGANA_SQLITE_PATH",
    "DOGANA_TOP_K",
    "DOGANA_MAX_CONTEXT_CHARS",
    "DOGANA_REGISTRY_PATH",
    "DOGANA_CODE_SPECIFIC_MODE",
    "DOGANA_OPENAI_API_KEY",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn ready_config() -> Config {
    let mut config = Config::default();
    config.store.url = Some("https://project.supabase.co".into());
    config.secrets.openai_api_key = Some(Secret::new("sk-test"));
    config.secrets.supabase_service_key = Some(Secret::new("service"));
    config
}

fn configuration_message(result: Result<(), RouteError>) -> String {
    match result {
        Err(RouteError::Configuration(msg)) => msg,
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
#[serial]
fn missing_file_yields_defaults() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/dogana.toml")).unwrap();
    assert_eq!(config.llm.model, "gpt-4o-mini");
    assert_eq!(config.llm.embedding_model, "text-embedding-3-small");
    assert_eq!(config.store.backend, StoreBackend::Postgrest);
    assert_eq!(config.store.chunks_table, "chunks");
    assert_eq!(config.store.search_function, "search_chunks_multi_type");
    assert_eq!(config.retrieval.top_k, 15);
    assert_eq!(config.retrieval.max_context_chars, 30_000);
    assert_eq!(config.retrieval.classification_category, "ANNEX_CODE");
    assert_eq!(config.retrieval.code_specific_mode, CodeSpecificMode::Direct);
    assert_eq!(config.sources.eurlex_language, "IT");
    assert_eq!(config.timeouts.llm_seconds, 120);
    assert!(config.registry.path.is_none());
}

#[test]
#[serial]
fn parses_toml_sections() {
    clear_env();
    let file = write_config(
        r#"
[llm]
model = "gpt-4.1"
temperature = 0.2

[store]
backend = "sqlite"
sqlite_path = "/tmp/dogana.db"

[retrieval]
top_k = 8
code_specific_mode = "transcribe"

[sources]
eurlex_language = "EN"

[timeouts]
llm_seconds = 60
"#,
    );

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.llm.model, "gpt-4.1");
    assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    assert_eq!(config.store.sqlite_path, "/tmp/dogana.db");
    assert_eq!(config.retrieval.top_k, 8);
    assert_eq!(config.retrieval.code_specific_mode, CodeSpecificMode::Transcribe);
    assert_eq!(config.sources.eurlex_language, "EN");
    assert_eq!(config.timeouts.llm_seconds, 60);
    assert_eq!(config.timeouts.store_seconds, 30);
}

#[test]
#[serial]
fn invalid_toml_is_an_error() {
    clear_env();
    let file = write_config("[retrieval\ntop_k = ");
    assert!(Config::load(file.path()).is_err());
}

#[test]
#[serial]
fn env_overrides_file_values() {
    clear_env();
    let file = write_config("[retrieval]\ntop_k = 8\n");
    unsafe {
        std::env::set_var("DOGANA_TOP_K", "12");
        std::env::set_var("DOGANA_STORE_BACKEND", "SQLite");
        std::env::set_var("DOGANA_STORE_URL", "https://env.supabase.co");
        std::env::set_var("DOGANA_CODE_SPECIFIC_MODE", "Transcribe");
        std::env::set_var("DOGANA_REGISTRY_PATH", "/etc/dogana/registry.toml");
    }

    let config = Config::load(file.path()).unwrap();
    clear_env();

    assert_eq!(config.retrieval.top_k, 12);
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    assert_eq!(config.store.url.as_deref(), Some("https://env.supabase.co"));
    assert_eq!(config.retrieval.code_specific_mode, CodeSpecificMode::Transcribe);
    assert_eq!(
        config.registry.path.as_deref(),
        Some("/etc/dogana/registry.toml")
    );
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("DOGANA_TOP_K", "many");
        std::env::set_var("DOGANA_STORE_BACKEND", "qdrant");
        std::env::set_var("DOGANA_MAX_CONTEXT_CHARS", "-1");
    }

    let config = Config::load(Path::new("/nonexistent/dogana.toml")).unwrap();
    clear_env();

    assert_eq!(config.retrieval.top_k, 15);
    assert_eq!(config.store.backend, StoreBackend::Postgrest);
    assert_eq!(config.retrieval.max_context_chars, 30_000);
}

#[test]
fn top_k_is_clamped() {
    assert_eq!(clamp_top_k(0), TOP_K_MIN);
    assert_eq!(clamp_top_k(3), 5);
    assert_eq!(clamp_top_k(12), 12);
    assert_eq!(clamp_top_k(100), TOP_K_MAX);
}

#[test]
fn retrieval_settings_apply_override_and_clamp() {
    let mut config = Config::default();
    config.retrieval.top_k = 50;
    config.timeouts.embedding_seconds = 7;

    let settings = config.retrieval_settings(None);
    assert_eq!(settings.top_k, 20);
    assert_eq!(settings.embedding_timeout, Duration::from_secs(7));
    assert_eq!(settings.llm_timeout, Duration::from_secs(120));
    assert_eq!(settings.eurlex_language, "IT");

    assert_eq!(config.retrieval_settings(Some(2)).top_k, 5);
    assert_eq!(config.retrieval_settings(Some(9)).top_k, 9);
}

#[test]
fn validate_accepts_complete_postgrest_config() {
    assert!(ready_config().validate().is_ok());
}

#[test]
fn validate_requires_api_key() {
    let mut config = ready_config();
    config.secrets.openai_api_key = None;
    let msg = configuration_message(config.validate());
    assert!(msg.contains(OPENAI_API_KEY));
}

#[test]
fn validate_requires_postgrest_url_and_key() {
    let mut config = ready_config();
    config.store.url = Some("  ".into());
    assert!(configuration_message(config.validate()).contains("store.url"));

    let mut config = ready_config();
    config.secrets.supabase_service_key = None;
    assert!(configuration_message(config.validate()).contains(SUPABASE_SERVICE_KEY));
}

#[test]
fn validate_sqlite_needs_path_only() {
    let mut config = ready_config();
    config.store.backend = StoreBackend::Sqlite;
    config.store.url = None;
    config.secrets.supabase_service_key = None;
    assert!(config.validate().is_ok());

    config.store.sqlite_path = String::new();
    assert!(configuration_message(config.validate()).contains("sqlite_path"));
}

#[test]
fn validate_rejects_bad_identifiers_and_zero_context() {
    let mut config = ready_config();
    config.store.chunks_table = "chunks; drop table x".into();
    assert!(configuration_message(config.validate()).contains("not a valid"));

    let mut config = ready_config();
    config.retrieval.max_context_chars = 0;
    assert!(configuration_message(config.validate()).contains("max_context_chars"));
}

#[tokio::test]
async fn resolve_secrets_from_vault() {
    let vault = HashMap::from([
        (OPENAI_API_KEY, "sk-vault"),
        (SUPABASE_SERVICE_KEY, "service-vault"),
    ]);
    let mut config = Config::default();
    config.resolve_secrets(&vault).await.unwrap();

    assert_eq!(
        config.secrets.openai_api_key.as_ref().map(Secret::expose),
        Some("sk-vault")
    );
    assert_eq!(
        config.secrets.supabase_service_key.as_ref().map(Secret::expose),
        Some("service-vault")
    );
}

#[tokio::test]
async fn resolve_secrets_leaves_missing_unset() {
    let mut config = Config::default();
    config
        .resolve_secrets(&HashMap::<&str, &str>::new())
        .await
        .unwrap();
    assert!(config.secrets.openai_api_key.is_none());
    assert!(config.secrets.supabase_service_key.is_none());
}

#[test]
fn load_registry_defaults_to_builtin() {
    let registry = Config::default().load_registry().unwrap();
    let ids: Vec<_> = registry.entries().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["dual_use", "nomenclature", "dual_use_correlations"]);
}

#[test]
fn load_registry_from_configured_file() {
    let file = write_config(
        r#"
[[entry]]
id = "tariff"
table = "tariff_lines"
code_field = "code"
text_field = "text"
pattern = '\bT\d{3}\b'
label = "Tariff"
match_mode = "exact"
source = { kind = "celex_field" }
"#,
    );
    let mut config = Config::default();
    config.registry.path = Some(file.path().display().to_string());

    let registry = config.load_registry().unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.get("tariff").is_some());

    config.registry.path = Some("/nonexistent/registry.toml".into());
    assert!(config.load_registry().is_err());
}

#[test]
#[serial]
fn config_path_resolution_order() {
    clear_env();
    assert_eq!(
        resolve_config_path(None),
        Path::new("config/default.toml")
    );

    unsafe { std::env::set_var("DOGANA_CONFIG", "/etc/dogana.toml") };
    assert_eq!(resolve_config_path(None), Path::new("/etc/dogana.toml"));
    assert_eq!(
        resolve_config_path(Some(Path::new("cli.toml"))),
        Path::new("cli.toml")
    );
    clear_env();
}
