use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dogana_core::config::{Config, StoreBackend, resolve_config_path};
use dogana_core::vault::EnvVaultProvider;
use dogana_core::{
    Fallback, Orchestrator, RouteError, RouteOutcome, RouteReport, ValidationError,
};
use dogana_llm::openai::OpenAiProvider;
use dogana_store::Datastore;
use dogana_store::postgrest::PostgrestStore;
use dogana_store::sqlite::SqliteStore;

/// Answer customs and export-control questions from the regulatory corpus.
#[derive(Debug, Parser)]
#[command(name = "dogana", version)]
struct Cli {
    /// Configuration file (default: $DOGANA_CONFIG, then config/default.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Evidence rows per lookup and search, clamped to 5..=20
    #[arg(long)]
    top_k: Option<usize>,

    /// The question; multiple words are joined with spaces
    #[arg(required = true, num_args = 1..)]
    question: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_subscriber();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<RouteError>() {
                Some(route) => println!("Errore: {route}"),
                None => println!("Errore: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let question = cli.question.join(" ");
    if question.trim().is_empty() {
        return Err(ValidationError::EmptyQuestion.into());
    }

    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)?;
    config.resolve_secrets(&EnvVaultProvider).await?;
    config.validate()?;

    let registry = config.load_registry()?;
    tracing::debug!("registry loaded: {} entries", registry.len());

    let provider = create_provider(&config)?;
    let store = create_store(&config).await?;
    let settings = config.retrieval_settings(cli.top_k);

    let orchestrator = Orchestrator::new(registry, provider, store, settings);
    let report = orchestrator.route(&question).await?;
    print_report(&report);
    Ok(())
}

fn create_provider(config: &Config) -> anyhow::Result<OpenAiProvider> {
    let api_key = config
        .secrets
        .openai_api_key
        .as_ref()
        .context("DOGANA_OPENAI_API_KEY is not set")?;
    let provider = OpenAiProvider::new(
        api_key.expose().to_owned(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.embedding_model.clone(),
        config.llm.max_tokens,
        Duration::from_secs(config.timeouts.llm_seconds),
    )?
    .with_temperature(config.llm.temperature);
    Ok(provider)
}

async fn create_store(config: &Config) -> anyhow::Result<Arc<dyn Datastore>> {
    let request_timeout = Duration::from_secs(config.timeouts.store_seconds);
    match config.store.backend {
        StoreBackend::Postgrest => {
            let url = config
                .store
                .url
                .as_deref()
                .context("store.url is required for the postgrest backend")?;
            let key = config
                .secrets
                .supabase_service_key
                .as_ref()
                .context("DOGANA_SUPABASE_SERVICE_KEY is not set")?;
            let store = PostgrestStore::new(url, key.expose().to_owned(), request_timeout)?
                .with_search_function(config.store.search_function.clone());
            tracing::info!("using postgrest store at {url}");
            Ok(Arc::new(store))
        }
        StoreBackend::Sqlite => {
            let store = SqliteStore::new(&config.store.sqlite_path)
                .await?
                .with_chunks_table(&config.store.chunks_table)?;
            tracing::info!("using sqlite store at {}", config.store.sqlite_path);
            Ok(Arc::new(store))
        }
    }
}

fn print_report(report: &RouteReport) {
    let trace = &report.trace;
    println!("{}", trace.routing_line());

    let (collateral, search): (Vec<_>, Vec<_>) = trace
        .fallbacks
        .iter()
        .partition(|f| matches!(f, Fallback::EmptyCollateral));
    for fallback in collateral {
        println!("[routing] {fallback}");
    }
    if let Some(line) = trace.normalization_line() {
        println!("{line}");
    }
    for fallback in search {
        println!("[routing] {fallback}");
    }

    match &report.outcome {
        RouteOutcome::DirectText { rows, attribution } => {
            println!("\n=== TESTO NORMATIVO ===\n");
            for row in rows {
                println!("{}", row.text);
                println!("\n---");
            }
            print_attribution(&attribution.render());
        }
        RouteOutcome::Answered {
            answer,
            attribution,
            ..
        } => {
            println!("\n=== RISPOSTA ===\n");
            println!("{answer}");
            print_attribution(&attribution.render());
        }
        RouteOutcome::NoResults => println!("Nessun risultato trovato."),
    }
}

fn print_attribution(block: &str) {
    if !block.is_empty() {
        println!("{block}");
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
