//! Result persistence: JSON snapshots, CSV reports, historical loading.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use crate::error::Result;
use crate::runner::EvaluationSummary;

const RESULT_PREFIX: &str = "evaluation_results_";

/// Writes the run summary as a timestamped JSON snapshot, returning the
/// file path.
///
/// # Errors
/// Returns `EvalError::Io`/`EvalError::Parse` on write or serialization
/// failures.
pub fn save_results(summary: &EvaluationSummary, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = output_dir.as_ref();
    fs::create_dir_all(dir)?;

    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{RESULT_PREFIX}{stamp}.json"));
    fs::write(&path, serde_json::to_string_pretty(summary)?)?;

    info!("Results saved to {}", path.display());
    Ok(path)
}

/// Writes a flattened CSV of the per-query rows, returning the file path.
///
/// # Errors
/// Returns `EvalError::Io` on write failures.
pub fn save_csv_report(
    summary: &EvaluationSummary,
    output_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let dir = output_dir.as_ref();
    fs::create_dir_all(dir)?;

    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("evaluation_report_{stamp}.csv"));

    let mut out = String::from(
        "query_index,query,category,response_time,retrieval_hit_rate,\
         hallucination_detected,hallucination_confidence,citations_count,error\n",
    );
    for row in summary
        .detailed_results
        .iter()
        .chain(summary.failed_queries.iter())
    {
        out.push_str(&format!(
            "{},{},{},{:.4},{:.4},{},{:.4},{},{}\n",
            row.query_index,
            csv_escape(&row.query),
            csv_escape(&row.query_category),
            row.response_time,
            row.retrieval_hit_rate,
            row.hallucination_detected,
            row.hallucination_confidence,
            row.citations_count,
            csv_escape(&row.response_error),
        ));
    }
    fs::write(&path, out)?;

    info!("CSV report saved to {}", path.display());
    Ok(path)
}

/// Quotes a CSV field when it contains separators or quotes.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Loads all historical result snapshots from a directory, sorted by
/// evaluation timestamp. Unreadable files are skipped with a warning.
pub fn load_historical(results_dir: impl AsRef<Path>) -> Vec<EvaluationSummary> {
    let dir = results_dir.as_ref();
    let mut history = Vec::new();

    let Ok(entries) = fs::read_dir(dir) else {
        return history;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(RESULT_PREFIX) || !name.ends_with(".json") {
            continue;
        }
        match fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()))
        {
            Ok(summary) => history.push(summary),
            Err(e) => warn!("Failed to load {}: {e}", path.display()),
        }
    }

    history.sort_by(|a: &EvaluationSummary, b: &EvaluationSummary| {
        a.evaluation_timestamp.cmp(&b.evaluation_timestamp)
    });
    history
}

/* ===== tests ===== */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{AggregateMetrics, QueryEvaluation, QueryOutcome};
    use std::collections::BTreeMap;

    fn summary(ts: &str) -> EvaluationSummary {
        EvaluationSummary {
            evaluation_timestamp: ts.to_string(),
            aggregate_metrics: AggregateMetrics {
                total_queries: 1,
                successful_queries: 1,
                failed_queries: 0,
                latency_p50: 2.0,
                latency_p95: 2.0,
                latency_mean: 2.0,
                retrieval_hit_rate_mean: 1.0,
                retrieval_hit_rate_std: 0.0,
                hallucination_rate_mean: 0.0,
                hallucination_rate_std: 0.0,
                total_citations: 2,
                avg_citations_per_query: 2.0,
            },
            category_analysis: BTreeMap::new(),
            detailed_results: vec![QueryEvaluation {
                query_index: 0,
                query: "Population of Kedah, in 2023?".to_string(),
                query_category: "simple_factual".to_string(),
                outcome: QueryOutcome::Succeeded,
                response_time: 2.0,
                response_content: "2,100.5 thousand".to_string(),
                response_error: String::new(),
                retrieval_hit_rate: 1.0,
                hallucination_detected: false,
                hallucination_confidence: 0.0,
                hallucination_issues: Vec::new(),
                citations_count: 2,
                citations: Vec::new(),
                expected_key_facts: Vec::new(),
                expected_sources: Vec::new(),
                timestamp: ts.to_string(),
            }],
            failed_queries: Vec::new(),
        }
    }

    #[test]
    fn snapshot_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        save_results(&summary("2026-08-01T00:00:00+00:00"), dir.path()).unwrap();

        let history = load_historical(dir.path());
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].aggregate_metrics.total_queries, 1);
        assert_eq!(history[0].detailed_results.len(), 1);
    }

    #[test]
    fn history_is_sorted_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        // Write out of order with distinct filenames.
        let a = summary("2026-08-02T00:00:00+00:00");
        let b = summary("2026-08-01T00:00:00+00:00");
        fs::write(
            dir.path().join("evaluation_results_20260802_000000.json"),
            serde_json::to_string(&a).unwrap(),
        )
        .unwrap();
        fs::write(
            dir.path().join("evaluation_results_20260801_000000.json"),
            serde_json::to_string(&b).unwrap(),
        )
        .unwrap();
        fs::write(dir.path().join("evaluation_results_bad.json"), "not json").unwrap();

        let history = load_historical(dir.path());
        assert_eq!(history.len(), 2);
        assert!(history[0].evaluation_timestamp < history[1].evaluation_timestamp);
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_csv_report(&summary("2026-08-01T00:00:00+00:00"), dir.path()).unwrap();
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.contains("\"Population of Kedah, in 2023?\""));
        assert_eq!(contents.lines().count(), 2);
    }
}
