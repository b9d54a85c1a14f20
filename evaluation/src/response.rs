//! Normalization of the answer endpoint's response shapes.
//!
//! The endpoint has shipped three wire shapes over time: the structured
//! API object, a legacy single-element array, and plain text. Each shape
//! gets its own adapter into [`NormalizedResponse`]; no field probing on
//! untyped maps.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One supporting document attached to an answer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Document {
    /// Explicit dataset identifier, when the endpoint sets one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    /// Generic source label (legacy shape).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Nested payload metadata, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Document text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Endpoint-agnostic view of one answer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NormalizedResponse {
    /// Answer text.
    pub content: String,
    /// Supporting documents, possibly empty.
    pub documents: Vec<Document>,
}

/// The known wire shapes, tried in declaration order by serde.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawResponse {
    /// Structured API object: `{"answer": ..., "sources": [...]}` or
    /// `{"content": ..., "documents": [...]}`.
    Structured(StructuredResponse),
    /// Legacy array shape: `[{"output": ..., "documents": [...]}]`.
    Legacy(Vec<LegacyItem>),
}

#[derive(Debug, Deserialize)]
pub struct StructuredResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    documents: Vec<Document>,
}

#[derive(Debug, Deserialize)]
pub struct LegacyItem {
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    documents: Vec<Document>,
}

/// Parses a response body, falling back to raw text when it is not JSON
/// in any known shape.
pub fn normalize(body: &str) -> NormalizedResponse {
    match serde_json::from_str::<RawResponse>(body) {
        Ok(RawResponse::Structured(s)) => normalize_structured(s),
        Ok(RawResponse::Legacy(items)) => normalize_legacy(items),
        Err(_) => NormalizedResponse {
            content: body.to_string(),
            documents: Vec::new(),
        },
    }
}

fn normalize_structured(s: StructuredResponse) -> NormalizedResponse {
    let content = s.answer.or(s.content).or(s.output).unwrap_or_default();

    // A plain `sources` list becomes one document per source so that
    // citation extraction sees a single shape.
    let documents = if !s.documents.is_empty() {
        s.documents
    } else {
        s.sources
            .into_iter()
            .map(|source| Document {
                text: Some(format!("Source: {source}")),
                source: Some(source),
                ..Default::default()
            })
            .collect()
    };

    NormalizedResponse { content, documents }
}

fn normalize_legacy(items: Vec<LegacyItem>) -> NormalizedResponse {
    let Some(first) = items.into_iter().next() else {
        return NormalizedResponse::default();
    };
    NormalizedResponse {
        content: first.output.or(first.content).unwrap_or_default(),
        documents: first.documents,
    }
}

/* ===== tests ===== */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_answer_with_sources() {
        let body = r#"{"query":"q","answer":"Kedah had 2,100k people.","sources":["state_parquet"],"confidence":0.67}"#;
        let n = normalize(body);
        assert_eq!(n.content, "Kedah had 2,100k people.");
        assert_eq!(n.documents.len(), 1);
        assert_eq!(n.documents[0].source.as_deref(), Some("state_parquet"));
    }

    #[test]
    fn legacy_array_shape() {
        let body = r#"[{"output":"the answer","documents":[{"text":"Data source: malaysia_api"}]}]"#;
        let n = normalize(body);
        assert_eq!(n.content, "the answer");
        assert_eq!(n.documents.len(), 1);
    }

    #[test]
    fn plain_text_falls_through() {
        let n = normalize("not json at all");
        assert_eq!(n.content, "not json at all");
        assert!(n.documents.is_empty());
    }

    #[test]
    fn empty_legacy_array_normalizes_to_empty() {
        let n = normalize("[]");
        assert!(n.content.is_empty());
        assert!(n.documents.is_empty());
    }
}
