//! Routing state machine.
//!
//! A question is classified and scanned for registry codes, then routed to
//! one of four paths:
//!
//! - code-specific: collateral lookup, evidence returned verbatim (falls back
//!   to the generic path when no entry returns rows)
//! - procedural with codes: collateral lookup plus unfiltered semantic search,
//!   answered by the model
//! - classification: category-filtered semantic search, retried once unfiltered
//! - generic: unfiltered semantic search
//!
//! Sources are attributed from registry metadata and evidence rows, never from
//! the model's answer.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dogana_llm::LlmProvider;
use dogana_store::Datastore;
use serde::{Deserialize, Serialize};

use crate::attribution::{Attribution, DEFAULT_EURLEX_LANGUAGE};
use crate::error::{Result, ValidationError, with_timeout};
use crate::evidence::EvidenceRow;
use crate::intent::Intent;
use crate::lookup::CollateralLookup;
use crate::matcher::{self, RegistryMatch};
use crate::normalizer;
use crate::prompt;
use crate::registry::{Registry, RegistryEntry};
use crate::search::SemanticSearch;

/// What to do with a non-empty code-specific evidence set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeSpecificMode {
    /// Print the evidence as-is, without calling the model.
    #[default]
    Direct,
    /// Have the model transcribe the evidence with the verbatim prompt.
    Transcribe,
}

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub max_context_chars: usize,
    pub classification_category: String,
    pub code_specific_mode: CodeSpecificMode,
    pub eurlex_language: String,
    pub embedding_timeout: Duration,
    pub llm_timeout: Duration,
    pub store_timeout: Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 15,
            max_context_chars: 30_000,
            classification_category: "ANNEX_CODE".into(),
            code_specific_mode: CodeSpecificMode::Direct,
            eurlex_language: DEFAULT_EURLEX_LANGUAGE.into(),
            embedding_timeout: Duration::from_secs(30),
            llm_timeout: Duration::from_secs(120),
            store_timeout: Duration::from_secs(30),
        }
    }
}

/// A routing decision that replaced the first choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// No collateral entry returned rows for the detected codes.
    EmptyCollateral,
    /// The category-filtered search was empty and was repeated unfiltered.
    UnfilteredSearch { filters: Vec<String> },
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCollateral => {
                f.write_str("nessun risultato collaterale → fallback vector search")
            }
            Self::UnfilteredSearch { filters } => write!(
                f,
                "nessun risultato con filtri=[{}] → fallback global",
                filters.join(",")
            ),
        }
    }
}

/// Diagnostics of one routing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTrace {
    pub base_intent: Intent,
    pub final_intent: Intent,
    /// `(entry id, code)` pairs in registry order.
    pub matches: Vec<(String, String)>,
    /// Text sent to the embedding step, when one was made.
    pub normalized_query: Option<String>,
    pub fallbacks: Vec<Fallback>,
}

impl RoutingTrace {
    fn new(base_intent: Intent, final_intent: Intent, matches: &[RegistryMatch<'_>]) -> Self {
        Self {
            base_intent,
            final_intent,
            matches: matches
                .iter()
                .map(|m| (m.entry.id.clone(), m.code.clone()))
                .collect(),
            normalized_query: None,
            fallbacks: Vec::new(),
        }
    }

    /// `[routing] intent=… | code=… | db=…`
    #[must_use]
    pub fn routing_line(&self) -> String {
        format!(
            "[routing] intent={} | code={} | db={}",
            self.final_intent,
            joined(self.matches.iter().map(|(_, code)| code.as_str())),
            joined(self.matches.iter().map(|(id, _)| id.as_str())),
        )
    }

    #[must_use]
    pub fn normalization_line(&self) -> Option<String> {
        self.normalized_query
            .as_ref()
            .map(|q| format!("[normalization] embedding query: {q}"))
    }
}

fn joined<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let items: Vec<_> = items.collect();
    if items.is_empty() {
        "-".to_owned()
    } else {
        items.join(",")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Code-specific evidence shown verbatim; the model was not called.
    DirectText {
        rows: Vec<EvidenceRow>,
        attribution: Attribution,
    },
    /// Model answer grounded on the evidence set.
    Answered {
        answer: String,
        evidence: Vec<EvidenceRow>,
        attribution: Attribution,
    },
    /// No path produced evidence.
    NoResults,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteReport {
    pub outcome: RouteOutcome,
    pub trace: RoutingTrace,
}

/// Collateral rows of one question and the entries that produced them.
struct Collateral<'r> {
    rows: Vec<EvidenceRow>,
    active: Vec<&'r RegistryEntry>,
}

pub struct Orchestrator<P> {
    registry: Registry,
    provider: P,
    lookup: CollateralLookup,
    search: SemanticSearch,
    settings: RetrievalSettings,
}

impl<P: LlmProvider> Orchestrator<P> {
    #[must_use]
    pub fn new(
        registry: Registry,
        provider: P,
        store: Arc<dyn Datastore>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            registry,
            provider,
            lookup: CollateralLookup::new(Arc::clone(&store), settings.store_timeout),
            search: SemanticSearch::new(store, settings.store_timeout),
            settings,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Route `question` to evidence and, where the path requires it, an answer.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank question or an over-long context,
    /// and a provider error when the embedding, completion or datastore call
    /// fails. Empty evidence is [`RouteOutcome::NoResults`], not an error.
    pub async fn route(&self, question: &str) -> Result<RouteReport> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion.into());
        }

        let base_intent = Intent::classify(question);
        let matches = matcher::detect(&self.registry, question);
        let mut intent = base_intent.resolve(!matches.is_empty());
        let mut trace = RoutingTrace::new(base_intent, intent, &matches);
        tracing::info!("{}", trace.routing_line());

        if intent == Intent::CodeSpecific {
            let collateral = self.collect_collateral(&matches).await?;
            if !collateral.rows.is_empty() {
                let outcome = self.code_specific_outcome(question, collateral).await?;
                return Ok(RouteReport { outcome, trace });
            }
            tracing::warn!("no collateral rows for {:?}, falling back", trace.matches);
            trace.fallbacks.push(Fallback::EmptyCollateral);
            intent = Intent::Generic;
        }

        let normalized = normalizer::normalize(question, intent);
        tracing::debug!("embedding query: {normalized}");
        let query_vector = with_timeout(
            "embedding",
            self.settings.embedding_timeout,
            self.provider.embed(&normalized),
        )
        .await?;
        trace.normalized_query = Some(normalized);

        if intent == Intent::Procedural && !matches.is_empty() {
            let collateral = self.collect_collateral(&matches).await?;
            let semantic = self
                .search
                .search(query_vector, self.settings.top_k, None)
                .await?;

            let attribution = Attribution::collect(
                &collateral.active,
                &collateral.rows,
                &self.settings.eurlex_language,
            );
            let mut evidence = collateral.rows;
            evidence.extend(semantic);
            let outcome = self.answer_outcome(question, evidence, attribution).await?;
            return Ok(RouteReport { outcome, trace });
        }

        let evidence = match intent {
            Intent::Classification => {
                let filters = vec![self.settings.classification_category.clone()];
                let filtered = self
                    .search
                    .search(
                        query_vector.clone(),
                        self.settings.top_k,
                        Some(filters.as_slice()),
                    )
                    .await?;
                if filtered.is_empty() {
                    tracing::warn!("no results with filters {filters:?}, searching unfiltered");
                    trace.fallbacks.push(Fallback::UnfilteredSearch { filters });
                    self.search
                        .search(query_vector, self.settings.top_k, None)
                        .await?
                } else {
                    filtered
                }
            }
            Intent::Procedural | Intent::Generic | Intent::CodeSpecific => {
                self.search
                    .search(query_vector, self.settings.top_k, None)
                    .await?
            }
        };

        let attribution = Attribution::collect(&[], &evidence, &self.settings.eurlex_language);
        let outcome = self.answer_outcome(question, evidence, attribution).await?;
        Ok(RouteReport { outcome, trace })
    }

    /// Look up every match, keeping the entries that returned rows.
    async fn collect_collateral<'r>(
        &self,
        matches: &[RegistryMatch<'r>],
    ) -> Result<Collateral<'r>> {
        let mut collateral = Collateral {
            rows: Vec::new(),
            active: Vec::new(),
        };
        for m in matches {
            let rows = self
                .lookup
                .lookup(m.entry, &m.code, self.settings.top_k)
                .await?;
            if !rows.is_empty() {
                collateral.rows.extend(rows);
                collateral.active.push(m.entry);
            }
        }
        Ok(collateral)
    }

    async fn code_specific_outcome(
        &self,
        question: &str,
        collateral: Collateral<'_>,
    ) -> Result<RouteOutcome> {
        let attribution = Attribution::collect(
            &collateral.active,
            &collateral.rows,
            &self.settings.eurlex_language,
        );
        match self.settings.code_specific_mode {
            CodeSpecificMode::Direct => Ok(RouteOutcome::DirectText {
                rows: collateral.rows,
                attribution,
            }),
            CodeSpecificMode::Transcribe => {
                let answer = self.complete(question, &collateral.rows, true).await?;
                Ok(RouteOutcome::Answered {
                    answer,
                    evidence: collateral.rows,
                    attribution,
                })
            }
        }
    }

    async fn answer_outcome(
        &self,
        question: &str,
        evidence: Vec<EvidenceRow>,
        attribution: Attribution,
    ) -> Result<RouteOutcome> {
        if evidence.is_empty() {
            return Ok(RouteOutcome::NoResults);
        }
        let answer = self.complete(question, &evidence, false).await?;
        Ok(RouteOutcome::Answered {
            answer,
            evidence,
            attribution,
        })
    }

    /// Call the model on `evidence`, rejecting contexts over the ceiling.
    async fn complete(
        &self,
        question: &str,
        evidence: &[EvidenceRow],
        verbatim: bool,
    ) -> Result<String> {
        let context = prompt::format_context(evidence);
        let len = context.chars().count();
        if len > self.settings.max_context_chars {
            return Err(ValidationError::ContextTooLong {
                len,
                max: self.settings.max_context_chars,
            }
            .into());
        }

        let messages = prompt::build_messages(question, &context, verbatim);
        tracing::debug!(
            "completion: {} evidence rows, {len} context chars, verbatim={verbatim}",
            evidence.len()
        );
        with_timeout(
            "completion",
            self.settings.llm_timeout,
            self.provider.chat(&messages),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use dogana_llm::mock::MockProvider;
    use dogana_store::in_memory_store::{InMemoryStore, StoredChunk};
    use serde_json::json;

    use super::*;
    use crate::attribution::Citation;
    use crate::error::{ErrorKind, RouteError};

    fn table_row(value: serde_json::Value) -> dogana_store::TableRow {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("row fixture must be an object"),
        }
    }

    fn article(text: &str, unit_type: &str, citation: &str) -> StoredChunk {
        StoredChunk {
            text: text.into(),
            metadata: json!({"article_number": "3"}),
            citation: Some(citation.into()),
            unit_type: Some(unit_type.into()),
            embedding: vec![1.0, 0.0, 0.0],
        }
    }

    fn orchestrator(
        store: InMemoryStore,
        provider: MockProvider,
        settings: RetrievalSettings,
    ) -> Orchestrator<MockProvider> {
        Orchestrator::new(
            Registry::builtin().unwrap(),
            provider,
            Arc::new(store),
            settings,
        )
    }

    fn dual_use_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_rows(
                "dual_use_items",
                vec![table_row(json!({
                    "code": "2B002",
                    "description": "2B002: Acoustic wave devices",
                    "celex_consolidated": "32021R0821"
                }))],
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn blank_question_is_rejected_before_any_call() {
        let mock = MockProvider::default();
        let orch = orchestrator(InMemoryStore::new(), mock.clone(), RetrievalSettings::default());
        let err = orch.route("   \n").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(mock.embed_calls().is_empty());
        assert!(mock.chat_calls().is_empty());
    }

    #[tokio::test]
    async fn code_specific_direct_text() {
        let mock = MockProvider::default();
        let orch = orchestrator(dual_use_store(), mock.clone(), RetrievalSettings::default());
        let report = orch.route("dimmi il bene 2b002").await.unwrap();

        assert_eq!(report.trace.final_intent, Intent::CodeSpecific);
        assert_eq!(report.trace.normalized_query, None);
        match report.outcome {
            RouteOutcome::DirectText { rows, attribution } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].text, "2B002: Acoustic wave devices");
                assert_eq!(
                    attribution.citations(),
                    [Citation::Dynamic {
                        identifier: "32021R0821".into(),
                        url: "https://eur-lex.europa.eu/legal-content/IT/TXT/?uri=CELEX:32021R0821"
                            .into()
                    }]
                );
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(mock.embed_calls().is_empty());
        assert!(mock.chat_calls().is_empty());
    }

    #[tokio::test]
    async fn transcribe_mode_uses_verbatim_prompt() {
        let mock = MockProvider::with_responses(vec!["trascrizione".into()]);
        let settings = RetrievalSettings {
            code_specific_mode: CodeSpecificMode::Transcribe,
            ..RetrievalSettings::default()
        };
        let orch = orchestrator(dual_use_store(), mock.clone(), settings);
        let report = orch.route("2B002").await.unwrap();

        match report.outcome {
            RouteOutcome::Answered {
                answer,
                attribution,
                ..
            } => {
                assert_eq!(answer, "trascrizione");
                assert_eq!(attribution.citations().len(), 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let calls = mock.chat_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].content, prompt::TRANSCRIPTION_PROMPT);
        assert!(mock.embed_calls().is_empty());
    }

    #[tokio::test]
    async fn procedural_without_codes_embeds_normalized_query() {
        let store = InMemoryStore::new();
        store
            .insert_chunk(article("Art. 3 - Obblighi", "ARTICLE", "32021R0821"))
            .unwrap();
        let mock = MockProvider::default();
        let orch = orchestrator(store, mock.clone(), RetrievalSettings::default());
        let report = orch
            .route("Cosa devo fare per esportare un drone?")
            .await
            .unwrap();

        assert_eq!(report.trace.final_intent, Intent::Procedural);
        assert_eq!(
            mock.embed_calls(),
            ["obblighi e autorizzazioni relativi a esportare un drone"]
        );
        let chat = mock.chat_calls();
        assert_eq!(chat[0][0].content, prompt::SYSTEM_PROMPT);
        assert!(chat[0][1]
            .content
            .ends_with("DOMANDA: Cosa devo fare per esportare un drone?"));
        assert!(matches!(report.outcome, RouteOutcome::Answered { .. }));
    }

    #[tokio::test]
    async fn generic_without_evidence_is_no_results() {
        let mock = MockProvider::default();
        let orch = orchestrator(InMemoryStore::new(), mock.clone(), RetrievalSettings::default());
        let report = orch.route("Cos'è il regolamento?").await.unwrap();
        assert_eq!(report.outcome, RouteOutcome::NoResults);
        assert_eq!(mock.embed_calls().len(), 1);
        assert!(mock.chat_calls().is_empty());
    }

    #[tokio::test]
    async fn embedding_failure_aborts() {
        let mock = MockProvider::failing_embed();
        let orch = orchestrator(InMemoryStore::new(), mock.clone(), RetrievalSettings::default());
        let err = orch.route("Cos'è il regolamento?").await.unwrap_err();
        assert!(err.is_provider());
        assert!(mock.chat_calls().is_empty());
    }

    #[tokio::test]
    async fn completion_failure_aborts() {
        let store = InMemoryStore::new();
        store
            .insert_chunk(article("Art. 1", "ARTICLE", "32021R0821"))
            .unwrap();
        let orch = orchestrator(store, MockProvider::failing(), RetrievalSettings::default());
        let err = orch.route("Cos'è il regolamento?").await.unwrap_err();
        assert!(matches!(err, RouteError::Provider(_)));
    }

    #[test]
    fn trace_lines() {
        let registry = Registry::builtin().unwrap();
        let matches = matcher::detect(&registry, "voce 8544");
        let mut trace = RoutingTrace::new(Intent::Generic, Intent::CodeSpecific, &matches);
        assert_eq!(
            trace.routing_line(),
            "[routing] intent=CODE_SPECIFIC | code=8544,8544 | db=nomenclature,dual_use_correlations"
        );
        assert_eq!(trace.normalization_line(), None);
        trace.normalized_query = Some("voce 8544".into());
        assert_eq!(
            trace.normalization_line().as_deref(),
            Some("[normalization] embedding query: voce 8544")
        );

        let empty = RoutingTrace::new(Intent::Generic, Intent::Generic, &[]);
        assert_eq!(empty.routing_line(), "[routing] intent=GENERIC | code=- | db=-");
    }

    #[test]
    fn fallback_messages() {
        assert_eq!(
            Fallback::UnfilteredSearch {
                filters: vec!["ANNEX_CODE".into()]
            }
            .to_string(),
            "nessun risultato con filtri=[ANNEX_CODE] → fallback global"
        );
        assert!(Fallback::EmptyCollateral.to_string().contains("fallback vector search"));
    }

    #[test]
    fn code_specific_mode_parses_lowercase() {
        let mode: CodeSpecificMode = serde_json::from_str("\"transcribe\"").unwrap();
        assert_eq!(mode, CodeSpecificMode::Transcribe);
    }
}
