//! Similarity retrieval over indexed population chunks.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::embed::EmbeddingsProvider;
use crate::errors::RagError;
use crate::filters::RagFilter;
use crate::qdrant_facade::QdrantFacade;

/// A single retrieved chunk with its similarity score and provenance.
#[derive(Clone, Debug, Serialize)]
pub struct QueryResult {
    /// Chunk text as stored.
    pub text: String,
    /// Cosine similarity score from the search.
    pub score: f32,
    /// The stored `metadata` payload object.
    pub metadata: Value,
    /// Dataset identifier the chunk was built from.
    pub source: String,
}

/// Embeds `query` and returns the top matching chunks.
///
/// Results below `score_threshold` are excluded by the store itself.
///
/// # Errors
/// Returns `RagError::Embedding` or `RagError::Qdrant` on provider or
/// store failures.
pub async fn search_chunks(
    facade: &QdrantFacade,
    provider: &dyn EmbeddingsProvider,
    query: &str,
    limit: u64,
    filter: &RagFilter,
    score_threshold: f32,
) -> Result<Vec<QueryResult>, RagError> {
    let vector = provider.embed(query).await?;
    let hits = facade
        .search(vector, limit, filter.to_qdrant(), score_threshold)
        .await?;

    let results = hits
        .into_iter()
        .map(|(score, payload)| {
            let text = payload
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let metadata = payload.get("metadata").cloned().unwrap_or(Value::Null);
            let source = infer_source(&metadata, &text);
            QueryResult {
                text,
                score,
                metadata,
                source,
            }
        })
        .collect::<Vec<_>>();

    debug!("Retrieved {} chunks for query", results.len());
    Ok(results)
}

/// Resolves the data source of a hit: the stored `data_source` field when
/// present, otherwise the `Data source:` line inside the chunk text,
/// otherwise `"unknown"`.
pub fn infer_source(metadata: &Value, text: &str) -> String {
    if let Some(src) = metadata.get("data_source").and_then(Value::as_str) {
        if !src.is_empty() {
            return src.to_string();
        }
    }
    for line in text.lines() {
        if let Some(rest) = line.trim().strip_prefix("Data source:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    "unknown".to_string()
}

/* ===== tests ===== */

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_prefers_metadata_field() {
        let meta = json!({"data_source": "malaysia_api"});
        assert_eq!(infer_source(&meta, "Data source: other"), "malaysia_api");
    }

    #[test]
    fn source_falls_back_to_text_line() {
        let meta = json!({});
        let text = "Population data for Kedah in 2023.\nData source: state_parquet";
        assert_eq!(infer_source(&meta, text), "state_parquet");
    }

    #[test]
    fn source_defaults_to_unknown() {
        assert_eq!(infer_source(&Value::Null, "no provenance here"), "unknown");
    }
}
