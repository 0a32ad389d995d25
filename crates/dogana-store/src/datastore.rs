use std::future::Future;
use std::pin::Pin;

use crate::error::StoreError;
use crate::types::{ChunkMatch, TableRow};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote (or local) query surface used by the retrieval pipeline.
///
/// Table and column names come from validated registry configuration; backends
/// still refuse anything that is not a plain identifier.
pub trait Datastore: Send + Sync {
    /// Rows of `table` whose `field` equals `value`, at most `limit`.
    fn select_eq(
        &self,
        table: &str,
        field: &str,
        value: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<TableRow>, StoreError>>;

    /// Rows of `table` whose `field` starts with `prefix`, ordered by `field`
    /// ascending, at most `limit`.
    fn select_prefix(
        &self,
        table: &str,
        field: &str,
        prefix: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<TableRow>, StoreError>>;

    /// Chunks most similar to `query_vector`, best first, at most `match_count`.
    ///
    /// `type_filters` restricts the search to chunks whose structural type tag
    /// is one of the given values; `None` searches every chunk.
    fn search_chunks(
        &self,
        query_vector: Vec<f32>,
        match_count: usize,
        type_filters: Option<Vec<String>>,
    ) -> BoxFuture<'_, Result<Vec<ChunkMatch>, StoreError>>;

    fn name(&self) -> &str;
}

pub(crate) fn check_identifiers(names: &[&str]) -> Result<(), StoreError> {
    match names.iter().find(|n| !crate::is_identifier(n)) {
        Some(bad) => Err(StoreError::InvalidIdentifier((*bad).to_owned())),
        None => Ok(()),
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    dot / denom
}
