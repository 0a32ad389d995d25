use serde::Deserialize;

/// One row of a collateral table, keyed by column name.
pub type TableRow = serde_json::Map<String, serde_json::Value>;

/// One hit returned by chunk similarity search.
///
/// `metadata` is passed through untouched: depending on the backend it is a
/// JSON object or a string holding serialized JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChunkMatch {
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default, rename = "celex_consolidated")]
    pub citation: Option<String>,
    #[serde(default)]
    pub similarity: Option<f32>,
}

/// Render a cell as the string the lookup compared against.
///
/// Numbers are rendered in their JSON form so numeric code columns still
/// participate in exact and prefix matching; other non-string cells yield `None`.
#[must_use]
pub fn cell_as_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_match_reads_rpc_row() {
        let hit: ChunkMatch = serde_json::from_value(serde_json::json!({
            "text": "Art. 3",
            "metadata": "{\"unit_type\": \"ARTICLE\"}",
            "celex_consolidated": "32021R0821",
            "similarity": 0.91
        }))
        .unwrap();
        assert_eq!(hit.citation.as_deref(), Some("32021R0821"));
        assert!(hit.metadata.is_string());
        assert!((hit.similarity.unwrap() - 0.91).abs() < 1e-6);
    }

    #[test]
    fn chunk_match_tolerates_missing_optional_columns() {
        let hit: ChunkMatch = serde_json::from_value(serde_json::json!({"text": "t"})).unwrap();
        assert!(hit.metadata.is_null());
        assert!(hit.citation.is_none());
        assert!(hit.similarity.is_none());
    }

    #[test]
    fn cell_as_text_renders_numbers() {
        assert_eq!(cell_as_text(&serde_json::json!(8544)).as_deref(), Some("8544"));
        assert_eq!(cell_as_text(&serde_json::json!("2B002")).as_deref(), Some("2B002"));
        assert!(cell_as_text(&serde_json::Value::Null).is_none());
    }
}
