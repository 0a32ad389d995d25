use dogana_store::types::cell_as_text;

/// Relevance assigned to rows from exact or structured lookups.
pub const STRUCTURED_RELEVANCE: f32 = 1.0;

/// One unit of retrieved evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceRow {
    pub text: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Per-row citation key, when the source provides one.
    pub citation_identifier: Option<String>,
    pub relevance: f32,
}

impl EvidenceRow {
    /// Non-empty string or number stored under `key`, rendered as text.
    #[must_use]
    pub fn metadata_text(&self, key: &str) -> Option<String> {
        self.metadata
            .get(key)
            .and_then(cell_as_text)
            .filter(|s| !s.is_empty())
    }
}

/// Parse chunk metadata that may arrive as a JSON object or as a string holding
/// one. Anything else yields an empty map.
#[must_use]
pub fn parse_metadata(raw: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match raw {
        serde_json::Value::Object(map) => map,
        serde_json::Value::String(s) => {
            match serde_json::from_str::<serde_json::Map<_, _>>(&s) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("ignoring malformed chunk metadata: {e}");
                    serde_json::Map::new()
                }
            }
        }
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            tracing::warn!("ignoring non-object chunk metadata: {other}");
            serde_json::Map::new()
        }
    }
}
