//! Exact and prefix lookups against registry-declared collateral tables.

use std::sync::Arc;
use std::time::Duration;

use dogana_store::types::cell_as_text;
use dogana_store::{Datastore, TableRow};

use crate::error::{Result, with_timeout};
use crate::evidence::{EvidenceRow, STRUCTURED_RELEVANCE};
use crate::registry::{CitationSource, MatchMode, RegistryEntry};

/// Hierarchy marker counted in the indent column.
const INDENT_MARKER: char = '-';
const INDENT_WIDTH: usize = 2;

pub struct CollateralLookup {
    store: Arc<dyn Datastore>,
    timeout: Duration,
}

impl CollateralLookup {
    #[must_use]
    pub fn new(store: Arc<dyn Datastore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Rows of `entry`'s table matching `code`, at most `limit`, mapped to
    /// evidence with fixed relevance.
    ///
    /// # Errors
    ///
    /// Returns a provider error if the datastore fails or times out.
    pub async fn lookup(
        &self,
        entry: &RegistryEntry,
        code: &str,
        limit: usize,
    ) -> Result<Vec<EvidenceRow>> {
        let query = match entry.match_mode {
            MatchMode::Exact => {
                self.store
                    .select_eq(&entry.table, &entry.code_field, code, limit)
            }
            MatchMode::Prefix => {
                self.store
                    .select_prefix(&entry.table, &entry.code_field, code, limit)
            }
        };
        let rows = with_timeout("datastore lookup", self.timeout, query).await?;
        tracing::debug!(
            "collateral lookup {}[{} {:?} {code}]: {} rows",
            entry.table,
            entry.code_field,
            entry.match_mode,
            rows.len()
        );

        Ok(rows
            .iter()
            .take(limit)
            .map(|row| evidence_from_row(entry, row))
            .collect())
    }
}

/// Map one collateral row to evidence.
#[must_use]
pub fn evidence_from_row(entry: &RegistryEntry, row: &TableRow) -> EvidenceRow {
    let raw_text = row
        .get(&entry.text_field)
        .and_then(cell_as_text)
        .unwrap_or_default();

    let text = match &entry.display_code_field {
        Some(display_field) => {
            let code = row
                .get(display_field)
                .or_else(|| row.get(&entry.code_field))
                .and_then(cell_as_text)
                .unwrap_or_default();
            let depth = row.get(&entry.indent_field).map_or(0, indent_depth);
            display_text(&code, depth, &raw_text)
        }
        None => raw_text,
    };

    let mut metadata = serde_json::Map::new();
    metadata.insert(
        "code".into(),
        row.get(&entry.code_field)
            .cloned()
            .unwrap_or(serde_json::Value::Null),
    );
    metadata.insert("source_id".into(), entry.id.clone().into());

    let citation_identifier = match &entry.source {
        CitationSource::CelexField { field } => row
            .get(field)
            .and_then(cell_as_text)
            .filter(|id| !id.trim().is_empty()),
        CitationSource::StaticCelex { .. } => None,
    };

    EvidenceRow {
        text,
        metadata,
        citation_identifier,
        relevance: STRUCTURED_RELEVANCE,
    }
}

/// Hierarchy level of a row: null or blank is a heading (0), otherwise the
/// number of `-` markers. A numeric cell is taken as the level itself.
#[must_use]
pub fn indent_depth(marker: &serde_json::Value) -> usize {
    match marker {
        serde_json::Value::String(s) => s.chars().filter(|c| *c == INDENT_MARKER).count(),
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|d| usize::try_from(d).ok())
            .unwrap_or(0),
        _ => 0,
    }
}

/// `{pad}{code}  {text}` where `code` is the first token of the stored display
/// code (so `"8544000000 80"` renders as `8544000000`).
#[must_use]
pub fn display_text(display_code: &str, depth: usize, text: &str) -> String {
    let code = display_code.split_whitespace().next().unwrap_or_default();
    let pad = " ".repeat(depth * INDENT_WIDTH);
    format!("{pad}{code}  {text}")
}
