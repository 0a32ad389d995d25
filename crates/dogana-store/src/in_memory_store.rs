use std::collections::HashMap;
use std::sync::RwLock;

use crate::datastore::{BoxFuture, Datastore, check_identifiers, cosine_similarity};
use crate::error::StoreError;
use crate::types::{ChunkMatch, TableRow, cell_as_text};

/// A chunk held by [`InMemoryStore`].
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub text: String,
    pub metadata: serde_json::Value,
    pub citation: Option<String>,
    pub unit_type: Option<String>,
    pub embedding: Vec<f32>,
}

/// Process-local datastore: collateral tables as row lists plus a brute-force
/// chunk index. Used for offline runs and as a substitute collaborator in tests.
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Vec<TableRow>>>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Append rows to `table`, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the table lock is poisoned.
    pub fn insert_rows(&self, table: &str, rows: Vec<TableRow>) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| StoreError::Other(e.to_string()))?;
        tables.entry(table.to_owned()).or_default().extend(rows);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the chunk lock is poisoned.
    pub fn insert_chunk(&self, chunk: StoredChunk) -> Result<(), StoreError> {
        self.chunks
            .write()
            .map_err(|e| StoreError::Other(e.to_string()))?
            .push(chunk);
        Ok(())
    }

    fn select(
        &self,
        table: &str,
        field: &str,
        limit: usize,
        keep: impl Fn(&str) -> bool,
    ) -> Result<Vec<TableRow>, StoreError> {
        check_identifiers(&[table, field])?;
        let tables = self
            .tables
            .read()
            .map_err(|e| StoreError::Other(e.to_string()))?;
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .filter(|row| {
                row.get(field)
                    .and_then(cell_as_text)
                    .is_some_and(|cell| keep(&cell))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn rank_chunks(
        &self,
        query_vector: &[f32],
        match_count: usize,
        type_filters: Option<&[String]>,
    ) -> Result<Vec<ChunkMatch>, StoreError> {
        let chunks = self
            .chunks
            .read()
            .map_err(|e| StoreError::Other(e.to_string()))?;

        let mut scored: Vec<(f32, &StoredChunk)> = chunks
            .iter()
            .filter(|c| match (type_filters, &c.unit_type) {
                (None, _) => true,
                (Some(filters), Some(tag)) => filters.iter().any(|f| f == tag),
                (Some(_), None) => false,
            })
            .map(|c| (cosine_similarity(query_vector, &c.embedding), c))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(match_count);

        Ok(scored
            .into_iter()
            .map(|(score, c)| ChunkMatch {
                text: c.text.clone(),
                metadata: c.metadata.clone(),
                citation: c.citation.clone(),
                similarity: Some(score),
            })
            .collect())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

impl Datastore for InMemoryStore {
    fn select_eq(
        &self,
        table: &str,
        field: &str,
        value: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<TableRow>, StoreError>> {
        let result = self.select(table, field, limit, |cell| cell == value);
        Box::pin(async move { result })
    }

    fn select_prefix(
        &self,
        table: &str,
        field: &str,
        prefix: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<TableRow>, StoreError>> {
        let result = self
            .select(table, field, usize::MAX, |cell| cell.starts_with(prefix))
            .map(|mut rows| {
                rows.sort_by_cached_key(|row| row.get(field).and_then(cell_as_text));
                rows.truncate(limit);
                rows
            });
        Box::pin(async move { result })
    }

    fn search_chunks(
        &self,
        query_vector: Vec<f32>,
        match_count: usize,
        type_filters: Option<Vec<String>>,
    ) -> BoxFuture<'_, Result<Vec<ChunkMatch>, StoreError>> {
        let result = self.rank_chunks(&query_vector, match_count, type_filters.as_deref());
        Box::pin(async move { result })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "memory"
    }
}
