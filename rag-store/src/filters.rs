//! Metadata filters for scoped retrieval.

use qdrant_client::qdrant::{Condition, Filter};

/// Optional metadata constraints applied during similarity search.
///
/// Both fields combine with AND semantics when present.
#[derive(Clone, Debug, Default)]
pub struct RagFilter {
    /// Exact match against `metadata.state`.
    pub state: Option<String>,
    /// Exact match against `metadata.year`.
    pub year: Option<i64>,
}

impl RagFilter {
    /// True when no constraint is set.
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.year.is_none()
    }

    /// Builds the Qdrant filter, or `None` when unconstrained so the
    /// search stays a plain similarity query.
    pub fn to_qdrant(&self) -> Option<Filter> {
        if self.is_empty() {
            return None;
        }

        let mut must = Vec::new();
        if let Some(state) = &self.state {
            must.push(Condition::matches("metadata.state", state.clone()));
        }
        if let Some(year) = self.year {
            must.push(Condition::matches("metadata.year", year));
        }
        Some(Filter::must(must))
    }

    /// Human-readable form for response metadata and logs.
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "state": self.state,
            "year": self.year,
        })
    }
}

/* ===== tests ===== */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_builds_nothing() {
        assert!(RagFilter::default().to_qdrant().is_none());
    }

    #[test]
    fn state_and_year_combine_as_must() {
        let f = RagFilter {
            state: Some("Selangor".to_string()),
            year: Some(2023),
        };
        let built = f.to_qdrant().unwrap();
        assert_eq!(built.must.len(), 2);
    }
}
