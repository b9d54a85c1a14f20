//! Query set loading.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EvalError, Result};

/// One evaluation query with its expectations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvalQuery {
    /// Stable identifier; older files call this `index`.
    #[serde(default, alias = "index")]
    pub id: Option<u64>,
    /// The question text.
    pub query: String,
    /// Grouping label for per-category analysis.
    #[serde(default = "default_category")]
    pub category: String,
    /// Data sources expected among the citations.
    #[serde(default)]
    pub expected_data_sources: Vec<String>,
    /// Key facts the answer is expected to mention.
    #[serde(default)]
    pub expected_key_facts: Vec<String>,
}

fn default_category() -> String {
    "unknown".to_string()
}

#[derive(Deserialize)]
struct QueryFile {
    #[serde(default)]
    evaluation_queries: Vec<EvalQuery>,
}

/// Loads the query set from a JSON file shaped as
/// `{"evaluation_queries": [...]}`.
///
/// # Errors
/// `EvalError::Io`/`EvalError::Parse` on unreadable or malformed files,
/// `EvalError::NoQueries` when the list is empty.
pub fn load_queries(path: impl AsRef<Path>) -> Result<Vec<EvalQuery>> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let file: QueryFile = serde_json::from_str(&raw)?;
    if file.evaluation_queries.is_empty() {
        return Err(EvalError::NoQueries);
    }
    info!(
        "Loaded {} evaluation queries from {}",
        file.evaluation_queries.len(),
        path.as_ref().display()
    );
    Ok(file.evaluation_queries)
}

/* ===== tests ===== */

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_queries_with_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"evaluation_queries": [
                {{"index": 3, "query": "Population of Kedah in 2023?",
                  "expected_data_sources": ["state_parquet"]}}
            ]}}"#
        )
        .unwrap();

        let queries = load_queries(f.path()).unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].id, Some(3));
        assert_eq!(queries[0].category, "unknown");
        assert!(queries[0].expected_key_facts.is_empty());
    }

    #[test]
    fn empty_query_set_is_an_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"evaluation_queries": []}}"#).unwrap();
        assert!(matches!(load_queries(f.path()), Err(EvalError::NoQueries)));
    }
}
