//! Citation extraction from normalized responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::{Document, NormalizedResponse};

const PREVIEW_MAX: usize = 100;

/// One extracted citation with a short preview of its document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub text_preview: String,
}

/// Extracts one citation per document.
pub fn extract_citations(response: &NormalizedResponse) -> Vec<Citation> {
    response
        .documents
        .iter()
        .map(|doc| Citation {
            source: resolve_source(doc),
            text_preview: text_preview(doc.text.as_deref().unwrap_or("")),
        })
        .collect()
}

/// Resolves a document's data source, trying strategies in order:
/// explicit `data_source` field, generic `source` field, nested
/// `metadata.data_source`, then a scan of the document text, else
/// `"unknown"`.
pub fn resolve_source(doc: &Document) -> String {
    if let Some(s) = non_empty(doc.data_source.as_deref()) {
        return s;
    }
    if let Some(s) = non_empty(doc.source.as_deref()) {
        return s;
    }
    if let Some(meta) = &doc.metadata {
        if let Some(s) = non_empty(meta.get("data_source").and_then(Value::as_str)) {
            return s;
        }
    }
    if let Some(text) = &doc.text {
        if let Some(s) = source_from_text(text) {
            return s;
        }
    }
    "unknown".to_string()
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty()).map(str::to_string)
}

fn source_from_text(text: &str) -> Option<String> {
    for line in text.lines() {
        if let Some(rest) = line.trim().strip_prefix("Data source:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    // Known dataset names are recognizable even without the marker line.
    if text.contains("state_parquet") {
        return Some("state_parquet".to_string());
    }
    if text.contains("malaysia_api") {
        return Some("malaysia_api".to_string());
    }
    None
}

fn text_preview(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "No content available".to_string();
    }
    if text.len() <= PREVIEW_MAX {
        return text.to_string();
    }
    let mut cut = PREVIEW_MAX;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

/* ===== tests ===== */

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn explicit_field_wins_over_everything() {
        let doc = Document {
            data_source: Some("malaysia_api".into()),
            source: Some("other".into()),
            metadata: Some(json!({"data_source": "third"})),
            text: Some("Data source: fourth".into()),
        };
        assert_eq!(resolve_source(&doc), "malaysia_api");
    }

    #[test]
    fn nested_metadata_beats_text_scan() {
        let doc = Document {
            metadata: Some(json!({"data_source": "state_parquet"})),
            text: Some("Data source: something_else".into()),
            ..Default::default()
        };
        assert_eq!(resolve_source(&doc), "state_parquet");
    }

    #[test]
    fn text_scan_recognizes_known_dataset_names() {
        let doc = Document {
            text: Some("chunk built from state_parquet extract".into()),
            ..Default::default()
        };
        assert_eq!(resolve_source(&doc), "state_parquet");
    }

    #[test]
    fn unknown_when_nothing_matches() {
        assert_eq!(resolve_source(&Document::default()), "unknown");
    }

    #[test]
    fn preview_is_truncated() {
        let p = text_preview(&"x".repeat(250));
        assert_eq!(p.len(), 103);
        assert!(p.ends_with("..."));
        assert_eq!(text_preview(""), "No content available");
    }
}
