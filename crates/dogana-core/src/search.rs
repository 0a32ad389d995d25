use std::sync::Arc;
use std::time::Duration;

use dogana_store::{ChunkMatch, Datastore};

use crate::error::{Result, with_timeout};
use crate::evidence::{EvidenceRow, parse_metadata};

/// Similarity search over the unified chunk store.
pub struct SemanticSearch {
    store: Arc<dyn Datastore>,
    timeout: Duration,
}

impl SemanticSearch {
    #[must_use]
    pub fn new(store: Arc<dyn Datastore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Best `limit` chunks for `query_vector`. `category_filters` restricts the
    /// search to chunks of the given structural types; `None` searches all.
    ///
    /// # Errors
    ///
    /// Returns a provider error if the datastore fails or times out.
    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        category_filters: Option<&[String]>,
    ) -> Result<Vec<EvidenceRow>> {
        let filters = category_filters.map(<[String]>::to_vec);
        tracing::debug!("semantic search: limit={limit} filters={filters:?}");

        let hits = with_timeout(
            "similarity search",
            self.timeout,
            self.store.search_chunks(query_vector, limit, filters),
        )
        .await?;

        Ok(hits.into_iter().map(evidence_from_match).collect())
    }
}

fn evidence_from_match(hit: ChunkMatch) -> EvidenceRow {
    EvidenceRow {
        text: hit.text,
        metadata: parse_metadata(hit.metadata),
        citation_identifier: hit.citation.filter(|id| !id.trim().is_empty()),
        relevance: hit.similarity.unwrap_or_default(),
    }
}
