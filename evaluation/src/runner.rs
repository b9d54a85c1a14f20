//! Concurrent evaluation runner.
//!
//! Dispatches every query to the answer endpoint at once, waits for all of
//! them, scores each response, and aggregates. A failed or timed-out query
//! never aborts the run; only an all-failed run is an error.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::citations::{Citation, extract_citations};
use crate::config::EvalConfig;
use crate::error::{EvalError, Result};
use crate::queries::EvalQuery;
use crate::response::{NormalizedResponse, normalize};
use crate::scoring::{HallucinationConfig, retrieval_hit_rate, score_hallucination};
use crate::stats;

/// How a single query ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
    Succeeded,
    Failed,
    TimedOut,
}

/// Scored record for one evaluated query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryEvaluation {
    pub query_index: usize,
    pub query: String,
    pub query_category: String,
    pub outcome: QueryOutcome,
    /// Wall-clock latency in seconds, including timeouts.
    pub response_time: f64,
    pub response_content: String,
    /// Error description for failed/timed-out queries, empty otherwise.
    pub response_error: String,
    pub retrieval_hit_rate: f64,
    pub hallucination_detected: bool,
    pub hallucination_confidence: f64,
    pub hallucination_issues: Vec<String>,
    pub citations_count: usize,
    pub citations: Vec<Citation>,
    pub expected_key_facts: Vec<String>,
    pub expected_sources: Vec<String>,
    pub timestamp: String,
}

/// Run-level aggregates over the successful queries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_queries: usize,
    pub successful_queries: usize,
    pub failed_queries: usize,
    pub latency_p50: f64,
    pub latency_p95: f64,
    pub latency_mean: f64,
    pub retrieval_hit_rate_mean: f64,
    pub retrieval_hit_rate_std: f64,
    pub hallucination_rate_mean: f64,
    pub hallucination_rate_std: f64,
    pub total_citations: usize,
    pub avg_citations_per_query: f64,
}

/// Per-category averages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: usize,
    pub avg_latency: f64,
    pub avg_hit_rate: f64,
    pub avg_hallucination_rate: f64,
}

/// Complete output of one evaluation run, the shape persisted to disk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub evaluation_timestamp: String,
    pub aggregate_metrics: AggregateMetrics,
    pub category_analysis: BTreeMap<String, CategoryStats>,
    pub detailed_results: Vec<QueryEvaluation>,
    pub failed_queries: Vec<QueryEvaluation>,
}

/// Evaluation driver holding the HTTP client and scoring weights.
pub struct Evaluator {
    client: reqwest::Client,
    cfg: EvalConfig,
    hallucination: HallucinationConfig,
}

impl Evaluator {
    /// Builds the evaluator and its HTTP client.
    ///
    /// # Errors
    /// Returns `EvalError::Config` for invalid settings and
    /// `EvalError::Transport` when the client cannot be constructed.
    pub fn new(cfg: EvalConfig) -> Result<Self> {
        cfg.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            cfg,
            hallucination: HallucinationConfig::default(),
        })
    }

    /// Runs the full evaluation over `queries`.
    ///
    /// # Errors
    /// Returns `EvalError::NoQueries` for an empty set and
    /// `EvalError::AllQueriesFailed` when no query succeeds.
    pub async fn run(&self, queries: &[EvalQuery]) -> Result<EvaluationSummary> {
        if queries.is_empty() {
            return Err(EvalError::NoQueries);
        }
        info!(
            "Starting evaluation of {} queries against {}",
            queries.len(),
            self.cfg.endpoint
        );

        let tasks = queries
            .iter()
            .enumerate()
            .map(|(i, q)| self.evaluate_query(i, q));
        let results = futures::future::join_all(tasks).await;

        let summary = summarize(results)?;
        let m = &summary.aggregate_metrics;
        info!(
            "Evaluation complete: {}/{} succeeded, p50 {:.2}s, p95 {:.2}s, hit-rate {:.2}, hallucination {:.2}",
            m.successful_queries,
            m.total_queries,
            m.latency_p50,
            m.latency_p95,
            m.retrieval_hit_rate_mean,
            m.hallucination_rate_mean
        );
        Ok(summary)
    }

    /// Sends one query and scores its response.
    async fn evaluate_query(&self, index: usize, query: &EvalQuery) -> QueryEvaluation {
        info!("Evaluating query {}: {}", index + 1, query.query);
        let started = Instant::now();

        let (outcome, response, error) = match self.send_query(&query.query).await {
            Ok(response) => (QueryOutcome::Succeeded, response, String::new()),
            Err(EvalError::Transport(e)) if e.is_timeout() => {
                error!("Query {} timed out after {}s", index + 1, self.cfg.timeout_secs);
                (
                    QueryOutcome::TimedOut,
                    NormalizedResponse::default(),
                    "timeout".to_string(),
                )
            }
            Err(e) => {
                error!("Query {} failed: {e}", index + 1);
                (QueryOutcome::Failed, NormalizedResponse::default(), e.to_string())
            }
        };
        let response_time = started.elapsed().as_secs_f64();

        self.score(index, query, outcome, response, error, response_time)
    }

    async fn send_query(&self, query: &str) -> Result<NormalizedResponse> {
        let payload = json!({
            "query": query,
            "max_results": self.cfg.max_results,
            "similarity_threshold": self.cfg.similarity_threshold,
        });

        let resp = self
            .client
            .post(&self.cfg.endpoint)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let snippet = body.chars().take(240).collect::<String>();
            return Err(EvalError::Http { status, snippet });
        }
        Ok(normalize(&body))
    }

    /// Pure scoring step, split out so tests can feed canned responses.
    fn score(
        &self,
        index: usize,
        query: &EvalQuery,
        outcome: QueryOutcome,
        response: NormalizedResponse,
        error: String,
        response_time: f64,
    ) -> QueryEvaluation {
        let (hit_rate, report, citations) = if outcome == QueryOutcome::Succeeded {
            let citations = extract_citations(&response);
            let retrieved: Vec<String> = citations.iter().map(|c| c.source.clone()).collect();
            let hit_rate = retrieval_hit_rate(&retrieved, &query.expected_data_sources);
            let report = score_hallucination(
                &response.content,
                &query.expected_key_facts,
                &self.hallucination,
            );
            (hit_rate, report, citations)
        } else {
            // An errored query scores as a full miss and a certain
            // hallucination, matching how it is excluded from aggregates.
            (
                0.0,
                crate::scoring::HallucinationReport {
                    detected: true,
                    confidence: 1.0,
                    issues: vec!["error_response".to_string()],
                },
                Vec::new(),
            )
        };

        if report.detected && outcome == QueryOutcome::Succeeded {
            warn!(
                "Query {} flagged as hallucination (confidence {:.2})",
                index + 1,
                report.confidence
            );
        }

        QueryEvaluation {
            query_index: index,
            query: query.query.clone(),
            query_category: query.category.clone(),
            outcome,
            response_time,
            response_content: response.content,
            response_error: error,
            retrieval_hit_rate: hit_rate,
            hallucination_detected: report.detected,
            hallucination_confidence: report.confidence,
            hallucination_issues: report.issues,
            citations_count: citations.len(),
            citations,
            expected_key_facts: query.expected_key_facts.clone(),
            expected_sources: query.expected_data_sources.clone(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Builds the run summary. Aggregates cover successful queries only;
/// failed and timed-out queries are listed separately.
pub fn summarize(results: Vec<QueryEvaluation>) -> Result<EvaluationSummary> {
    let total = results.len();
    let (successes, failures): (Vec<_>, Vec<_>) = results
        .into_iter()
        .partition(|r| r.outcome == QueryOutcome::Succeeded);

    if successes.is_empty() {
        return Err(EvalError::AllQueriesFailed);
    }

    let latencies: Vec<f64> = successes.iter().map(|r| r.response_time).collect();
    let hit_rates: Vec<f64> = successes.iter().map(|r| r.retrieval_hit_rate).collect();
    let hallucinations: Vec<f64> = successes
        .iter()
        .map(|r| r.hallucination_confidence)
        .collect();
    let citation_counts: Vec<f64> = successes.iter().map(|r| r.citations_count as f64).collect();

    let aggregate_metrics = AggregateMetrics {
        total_queries: total,
        successful_queries: successes.len(),
        failed_queries: total - successes.len(),
        latency_p50: stats::percentile(&latencies, 50.0),
        latency_p95: stats::percentile(&latencies, 95.0),
        latency_mean: stats::mean(&latencies),
        retrieval_hit_rate_mean: stats::mean(&hit_rates),
        retrieval_hit_rate_std: stats::std_dev(&hit_rates),
        hallucination_rate_mean: stats::mean(&hallucinations),
        hallucination_rate_std: stats::std_dev(&hallucinations),
        total_citations: successes.iter().map(|r| r.citations_count).sum(),
        avg_citations_per_query: stats::mean(&citation_counts),
    };

    let mut category_analysis = BTreeMap::new();
    for category in successes
        .iter()
        .map(|r| r.query_category.clone())
        .collect::<std::collections::BTreeSet<_>>()
    {
        let rows: Vec<&QueryEvaluation> = successes
            .iter()
            .filter(|r| r.query_category == category)
            .collect();
        category_analysis.insert(
            category,
            CategoryStats {
                count: rows.len(),
                avg_latency: stats::mean(
                    &rows.iter().map(|r| r.response_time).collect::<Vec<_>>(),
                ),
                avg_hit_rate: stats::mean(
                    &rows.iter().map(|r| r.retrieval_hit_rate).collect::<Vec<_>>(),
                ),
                avg_hallucination_rate: stats::mean(
                    &rows
                        .iter()
                        .map(|r| r.hallucination_confidence)
                        .collect::<Vec<_>>(),
                ),
            },
        );
    }

    Ok(EvaluationSummary {
        evaluation_timestamp: Utc::now().to_rfc3339(),
        aggregate_metrics,
        category_analysis,
        detailed_results: successes,
        failed_queries: failures,
    })
}

/* ===== tests ===== */

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(
        index: usize,
        category: &str,
        outcome: QueryOutcome,
        response_time: f64,
        hit_rate: f64,
        hallucination: f64,
        citations_count: usize,
    ) -> QueryEvaluation {
        QueryEvaluation {
            query_index: index,
            query: format!("query {index}"),
            query_category: category.to_string(),
            outcome,
            response_time,
            response_content: String::new(),
            response_error: if outcome == QueryOutcome::Succeeded {
                String::new()
            } else {
                "timeout".to_string()
            },
            retrieval_hit_rate: hit_rate,
            hallucination_detected: hallucination > 0.5,
            hallucination_confidence: hallucination,
            hallucination_issues: Vec::new(),
            citations_count,
            citations: Vec::new(),
            expected_key_facts: Vec::new(),
            expected_sources: Vec::new(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn timeout_is_excluded_from_aggregates() {
        let results = vec![
            evaluation(0, "simple", QueryOutcome::Succeeded, 2.0, 1.0, 0.1, 2),
            evaluation(1, "simple", QueryOutcome::TimedOut, 60.0, 0.0, 1.0, 0),
            evaluation(2, "complex", QueryOutcome::Succeeded, 4.0, 0.5, 0.3, 1),
        ];
        let summary = summarize(results).unwrap();
        let m = &summary.aggregate_metrics;

        assert_eq!(m.total_queries, 3);
        assert_eq!(m.successful_queries, 2);
        assert_eq!(m.failed_queries, 1);
        // 60s timeout must not drag the latency mean up
        assert!((m.latency_mean - 3.0).abs() < 1e-9);
        assert!((m.retrieval_hit_rate_mean - 0.75).abs() < 1e-9);
        assert_eq!(m.total_citations, 3);
        assert_eq!(summary.failed_queries.len(), 1);
        assert_eq!(summary.detailed_results.len(), 2);
    }

    #[test]
    fn all_failed_run_is_fatal() {
        let results = vec![
            evaluation(0, "simple", QueryOutcome::Failed, 1.0, 0.0, 1.0, 0),
            evaluation(1, "simple", QueryOutcome::TimedOut, 60.0, 0.0, 1.0, 0),
        ];
        assert!(matches!(
            summarize(results),
            Err(EvalError::AllQueriesFailed)
        ));
    }

    #[test]
    fn categories_are_averaged_separately() {
        let results = vec![
            evaluation(0, "simple", QueryOutcome::Succeeded, 2.0, 1.0, 0.0, 2),
            evaluation(1, "simple", QueryOutcome::Succeeded, 4.0, 0.5, 0.2, 2),
            evaluation(2, "complex", QueryOutcome::Succeeded, 10.0, 0.2, 0.6, 0),
        ];
        let summary = summarize(results).unwrap();

        let simple = &summary.category_analysis["simple"];
        assert_eq!(simple.count, 2);
        assert!((simple.avg_latency - 3.0).abs() < 1e-9);
        assert!((simple.avg_hit_rate - 0.75).abs() < 1e-9);

        let complex = &summary.category_analysis["complex"];
        assert_eq!(complex.count, 1);
        assert!((complex.avg_hallucination_rate - 0.6).abs() < 1e-9);
    }
}
