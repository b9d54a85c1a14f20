//! Detailed metric calculations: distributions, quality score, trends.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EvalError, Result};
use crate::runner::{EvaluationSummary, QueryEvaluation};
use crate::stats;

fn min_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn max_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Latency distribution over one set of queries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LatencyMetrics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub range: f64,
}

impl LatencyMetrics {
    pub fn from_times(times: &[f64]) -> Self {
        let min = min_of(times);
        let max = max_of(times);
        Self {
            count: times.len(),
            mean: stats::mean(times),
            median: stats::median(times),
            std: stats::std_dev(times),
            min,
            max,
            p25: stats::percentile(times, 25.0),
            p50: stats::percentile(times, 50.0),
            p75: stats::percentile(times, 75.0),
            p90: stats::percentile(times, 90.0),
            p95: stats::percentile(times, 95.0),
            p99: stats::percentile(times, 99.0),
            range: max - min,
        }
    }
}

/// Hit-rate distribution plus success buckets.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Fraction of queries with hit-rate >= 0.8.
    pub success_rate: f64,
    /// Fraction in [0.5, 0.8).
    pub partial_success_rate: f64,
    /// Fraction below 0.5.
    pub failure_rate: f64,
}

impl RetrievalMetrics {
    pub fn from_hit_rates(rates: &[f64]) -> Self {
        let n = rates.len().max(1) as f64;
        Self {
            count: rates.len(),
            mean: stats::mean(rates),
            median: stats::median(rates),
            std: stats::std_dev(rates),
            min: min_of(rates),
            max: max_of(rates),
            success_rate: rates.iter().filter(|r| **r >= 0.8).count() as f64 / n,
            partial_success_rate: rates.iter().filter(|r| **r >= 0.5 && **r < 0.8).count() as f64
                / n,
            failure_rate: rates.iter().filter(|r| **r < 0.5).count() as f64 / n,
        }
    }
}

/// Hallucination-score distribution plus severity buckets.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HallucinationMetrics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Fraction with score >= 0.8.
    pub critical_rate: f64,
    /// Fraction in [0.5, 0.8).
    pub moderate_rate: f64,
    /// Fraction below 0.5.
    pub low_rate: f64,
}

impl HallucinationMetrics {
    pub fn from_scores(scores: &[f64]) -> Self {
        let n = scores.len().max(1) as f64;
        Self {
            count: scores.len(),
            mean: stats::mean(scores),
            median: stats::median(scores),
            std: stats::std_dev(scores),
            min: min_of(scores),
            max: max_of(scores),
            critical_rate: scores.iter().filter(|s| **s >= 0.8).count() as f64 / n,
            moderate_rate: scores.iter().filter(|s| **s >= 0.5 && **s < 0.8).count() as f64 / n,
            low_rate: scores.iter().filter(|s| **s < 0.5).count() as f64 / n,
        }
    }
}

/// Citation-count distribution plus coverage buckets.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CitationMetrics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub zero_citation_rate: f64,
    pub low_citation_rate: f64,
    pub good_citation_rate: f64,
}

impl CitationMetrics {
    pub fn from_counts(counts: &[usize]) -> Self {
        let as_f: Vec<f64> = counts.iter().map(|c| *c as f64).collect();
        let n = counts.len().max(1) as f64;
        Self {
            count: counts.len(),
            mean: stats::mean(&as_f),
            median: stats::median(&as_f),
            std: stats::std_dev(&as_f),
            min: min_of(&as_f),
            max: max_of(&as_f),
            zero_citation_rate: counts.iter().filter(|c| **c == 0).count() as f64 / n,
            low_citation_rate: counts.iter().filter(|c| **c == 1).count() as f64 / n,
            good_citation_rate: counts.iter().filter(|c| **c >= 2).count() as f64 / n,
        }
    }
}

/// Weighted overall score with per-component breakdown.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QualityScore {
    pub overall_score: f64,
    pub latency_score: f64,
    pub retrieval_score: f64,
    pub hallucination_score: f64,
    pub citation_score: f64,
    pub performance_grade: String,
}

/// Computes the weighted quality score: 20% latency (normalized to a 30s
/// ceiling), 40% hit-rate, 30% hallucination-inverse, 10% citations
/// (normalized to 3 per query).
pub fn quality_score(results: &[QueryEvaluation]) -> QualityScore {
    let times: Vec<f64> = results.iter().map(|r| r.response_time).collect();
    let hit_rates: Vec<f64> = results.iter().map(|r| r.retrieval_hit_rate).collect();
    let hallucinations: Vec<f64> = results.iter().map(|r| r.hallucination_confidence).collect();
    let citations: Vec<f64> = results.iter().map(|r| r.citations_count as f64).collect();

    let latency_score = 1.0 - (stats::mean(&times) / 30.0).min(1.0);
    let retrieval_score = stats::mean(&hit_rates);
    let hallucination_score = 1.0 - stats::mean(&hallucinations);
    let citation_score = (stats::mean(&citations) / 3.0).min(1.0);

    let overall_score = latency_score * 0.2
        + retrieval_score * 0.4
        + hallucination_score * 0.3
        + citation_score * 0.1;

    QualityScore {
        overall_score,
        latency_score,
        retrieval_score,
        hallucination_score,
        citation_score,
        performance_grade: performance_grade(overall_score).to_string(),
    }
}

/// Letter grade for an overall score.
pub fn performance_grade(score: f64) -> &'static str {
    if score >= 0.9 {
        "A+"
    } else if score >= 0.8 {
        "A"
    } else if score >= 0.7 {
        "B"
    } else if score >= 0.6 {
        "C"
    } else if score >= 0.5 {
        "D"
    } else {
        "F"
    }
}

/// Per-category breakdown across all metric families.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CategoryPerformance {
    pub count: usize,
    pub latency: LatencyMetrics,
    pub retrieval: RetrievalMetrics,
    pub hallucination: HallucinationMetrics,
    pub citations: CitationMetrics,
    pub queries: Vec<String>,
}

pub fn category_performance(
    results: &[QueryEvaluation],
) -> BTreeMap<String, CategoryPerformance> {
    let mut out = BTreeMap::new();
    let categories: std::collections::BTreeSet<_> =
        results.iter().map(|r| r.query_category.clone()).collect();

    for category in categories {
        let rows: Vec<&QueryEvaluation> = results
            .iter()
            .filter(|r| r.query_category == category)
            .collect();
        let times: Vec<f64> = rows.iter().map(|r| r.response_time).collect();
        let hit_rates: Vec<f64> = rows.iter().map(|r| r.retrieval_hit_rate).collect();
        let scores: Vec<f64> = rows.iter().map(|r| r.hallucination_confidence).collect();
        let counts: Vec<usize> = rows.iter().map(|r| r.citations_count).collect();

        out.insert(
            category,
            CategoryPerformance {
                count: rows.len(),
                latency: LatencyMetrics::from_times(&times),
                retrieval: RetrievalMetrics::from_hit_rates(&hit_rates),
                hallucination: HallucinationMetrics::from_scores(&scores),
                citations: CitationMetrics::from_counts(&counts),
                queries: rows.iter().map(|r| r.query.clone()).collect(),
            },
        );
    }
    out
}

/// Which slope sign counts as progress for a metric.
#[derive(Clone, Copy, Debug)]
enum Polarity {
    /// Latency, hallucination: a falling series is progress.
    LowerIsBetter,
    /// Hit-rate: a rising series is progress.
    HigherIsBetter,
}

/// Linear trend of one metric across historical runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trend {
    pub slope: f64,
    pub correlation: f64,
    pub direction: String,
}

fn trend(hours: &[f64], values: &[f64], polarity: Polarity) -> Trend {
    let slope = stats::slope(hours, values);
    let correlation = stats::correlation(hours, values);
    let direction = if slope == 0.0 {
        "stable"
    } else {
        let improving = match polarity {
            Polarity::LowerIsBetter => slope < 0.0,
            Polarity::HigherIsBetter => slope > 0.0,
        };
        if improving { "improving" } else { "declining" }
    };
    Trend {
        slope,
        correlation,
        direction: direction.to_string(),
    }
}

/// Run-to-run variability; lower coefficients of variation mean a more
/// stable system.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StabilityAnalysis {
    pub latency_cv: f64,
    pub hit_rate_cv: f64,
    pub hallucination_cv: f64,
    pub overall_stability_score: f64,
}

/// Cross-run trends over historical summaries, against elapsed hours.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub time_span_hours: f64,
    pub evaluations_count: usize,
    pub latency_trend: Trend,
    pub hit_rate_trend: Trend,
    pub hallucination_trend: Trend,
    pub stability_analysis: StabilityAnalysis,
}

/// Analyzes metric trends over historical evaluation snapshots.
///
/// # Errors
/// Returns `EvalError::InsufficientHistory` with fewer than two
/// timestamped snapshots.
pub fn analyze_trends(history: &[EvaluationSummary]) -> Result<TrendAnalysis> {
    let mut timestamps = Vec::new();
    let mut latencies = Vec::new();
    let mut hit_rates = Vec::new();
    let mut hallucinations = Vec::new();

    for summary in history {
        let Ok(ts) = summary.evaluation_timestamp.parse::<DateTime<Utc>>() else {
            debug!(
                "Skipping snapshot with unparseable timestamp: {}",
                summary.evaluation_timestamp
            );
            continue;
        };
        timestamps.push(ts);
        latencies.push(summary.aggregate_metrics.latency_mean);
        hit_rates.push(summary.aggregate_metrics.retrieval_hit_rate_mean);
        hallucinations.push(summary.aggregate_metrics.hallucination_rate_mean);
    }

    if timestamps.len() < 2 {
        return Err(EvalError::InsufficientHistory);
    }

    let base = timestamps[0];
    let hours: Vec<f64> = timestamps
        .iter()
        .map(|t| (*t - base).num_seconds() as f64 / 3600.0)
        .collect();

    let stability = StabilityAnalysis {
        latency_cv: stats::coefficient_of_variation(&latencies),
        hit_rate_cv: stats::coefficient_of_variation(&hit_rates),
        hallucination_cv: stats::coefficient_of_variation(&hallucinations),
        overall_stability_score: 0.0,
    };
    let stability = StabilityAnalysis {
        overall_stability_score: ((1.0 - stability.latency_cv).max(0.0)
            + (1.0 - stability.hit_rate_cv).max(0.0)
            + (1.0 - stability.hallucination_cv).max(0.0))
            / 3.0,
        ..stability
    };

    Ok(TrendAnalysis {
        time_span_hours: hours.iter().copied().fold(0.0, f64::max),
        evaluations_count: timestamps.len(),
        latency_trend: trend(&hours, &latencies, Polarity::LowerIsBetter),
        hit_rate_trend: trend(&hours, &hit_rates, Polarity::HigherIsBetter),
        hallucination_trend: trend(&hours, &hallucinations, Polarity::LowerIsBetter),
        stability_analysis: stability,
    })
}

/// Threshold-driven improvement recommendations.
pub fn recommendations(results: &[QueryEvaluation]) -> Vec<String> {
    let mut out = Vec::new();

    let times: Vec<f64> = results.iter().map(|r| r.response_time).collect();
    if stats::mean(&times) > 10.0 {
        out.push(
            "Consider optimizing response time - current average exceeds 10 seconds".to_string(),
        );
    }

    let hit_rates: Vec<f64> = results.iter().map(|r| r.retrieval_hit_rate).collect();
    if stats::mean(&hit_rates) < 0.7 {
        out.push(
            "Retrieval accuracy below 70% - consider improving search algorithms or data indexing"
                .to_string(),
        );
    }

    let scores: Vec<f64> = results.iter().map(|r| r.hallucination_confidence).collect();
    if stats::mean(&scores) > 0.3 {
        out.push(
            "High hallucination rate detected - consider improving fact-checking and response validation"
                .to_string(),
        );
    }

    let citations: Vec<f64> = results.iter().map(|r| r.citations_count as f64).collect();
    if stats::mean(&citations) < 1.0 {
        out.push("Low citation rate - ensure responses include proper source citations".to_string());
    }

    for (category, perf) in category_performance(results) {
        if perf.retrieval.mean < 0.6 {
            out.push(format!(
                "Consider improving {category} query handling - retrieval accuracy is low"
            ));
        }
    }

    if out.is_empty() {
        out.push("System performance is good - continue monitoring".to_string());
    }
    out
}

/// The full post-run report combining every metric family.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComprehensiveReport {
    pub report_timestamp: String,
    pub latency_metrics: LatencyMetrics,
    pub retrieval_metrics: RetrievalMetrics,
    pub hallucination_metrics: HallucinationMetrics,
    pub citation_metrics: CitationMetrics,
    pub category_performance: BTreeMap<String, CategoryPerformance>,
    pub quality_score: QualityScore,
    pub recommendations: Vec<String>,
}

/// Builds the comprehensive report from a run summary's detailed results.
pub fn comprehensive_report(summary: &EvaluationSummary) -> ComprehensiveReport {
    let results = &summary.detailed_results;
    let times: Vec<f64> = results.iter().map(|r| r.response_time).collect();
    let hit_rates: Vec<f64> = results.iter().map(|r| r.retrieval_hit_rate).collect();
    let scores: Vec<f64> = results.iter().map(|r| r.hallucination_confidence).collect();
    let counts: Vec<usize> = results.iter().map(|r| r.citations_count).collect();

    ComprehensiveReport {
        report_timestamp: Utc::now().to_rfc3339(),
        latency_metrics: LatencyMetrics::from_times(&times),
        retrieval_metrics: RetrievalMetrics::from_hit_rates(&hit_rates),
        hallucination_metrics: HallucinationMetrics::from_scores(&scores),
        citation_metrics: CitationMetrics::from_counts(&counts),
        category_performance: category_performance(results),
        quality_score: quality_score(results),
        recommendations: recommendations(results),
    }
}

/* ===== tests ===== */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{AggregateMetrics, QueryOutcome};

    fn result(
        category: &str,
        response_time: f64,
        hit_rate: f64,
        hallucination: f64,
        citations: usize,
    ) -> QueryEvaluation {
        QueryEvaluation {
            query_index: 0,
            query: format!("{category} question"),
            query_category: category.to_string(),
            outcome: QueryOutcome::Succeeded,
            response_time,
            response_content: String::new(),
            response_error: String::new(),
            retrieval_hit_rate: hit_rate,
            hallucination_detected: hallucination > 0.5,
            hallucination_confidence: hallucination,
            hallucination_issues: Vec::new(),
            citations_count: citations,
            citations: Vec::new(),
            expected_key_facts: Vec::new(),
            expected_sources: Vec::new(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    fn summary_at(ts: &str, latency: f64, hit_rate: f64, hallucination: f64) -> EvaluationSummary {
        EvaluationSummary {
            evaluation_timestamp: ts.to_string(),
            aggregate_metrics: AggregateMetrics {
                total_queries: 1,
                successful_queries: 1,
                failed_queries: 0,
                latency_p50: latency,
                latency_p95: latency,
                latency_mean: latency,
                retrieval_hit_rate_mean: hit_rate,
                retrieval_hit_rate_std: 0.0,
                hallucination_rate_mean: hallucination,
                hallucination_rate_std: 0.0,
                total_citations: 1,
                avg_citations_per_query: 1.0,
            },
            category_analysis: BTreeMap::new(),
            detailed_results: Vec::new(),
            failed_queries: Vec::new(),
        }
    }

    #[test]
    fn grade_thresholds() {
        assert_eq!(performance_grade(0.95), "A+");
        assert_eq!(performance_grade(0.9), "A+");
        assert_eq!(performance_grade(0.85), "A");
        assert_eq!(performance_grade(0.7), "B");
        assert_eq!(performance_grade(0.65), "C");
        assert_eq!(performance_grade(0.5), "D");
        assert_eq!(performance_grade(0.49), "F");
    }

    #[test]
    fn quality_score_weights_components() {
        // mean latency 3s, hit rate 1.0, hallucination 0.0, 3 citations
        let results = vec![result("simple", 3.0, 1.0, 0.0, 3)];
        let q = quality_score(&results);

        assert!((q.latency_score - 0.9).abs() < 1e-9);
        assert_eq!(q.retrieval_score, 1.0);
        assert_eq!(q.hallucination_score, 1.0);
        assert_eq!(q.citation_score, 1.0);
        assert!((q.overall_score - (0.18 + 0.4 + 0.3 + 0.1)).abs() < 1e-9);
        assert_eq!(q.performance_grade, "A+");
    }

    #[test]
    fn trends_need_two_snapshots() {
        let history = vec![summary_at("2026-08-01T00:00:00+00:00", 5.0, 0.8, 0.2)];
        assert!(matches!(
            analyze_trends(&history),
            Err(EvalError::InsufficientHistory)
        ));
    }

    #[test]
    fn latency_trend_tracks_decline() {
        let history = vec![
            summary_at("2026-08-01T00:00:00+00:00", 10.0, 0.6, 0.4),
            summary_at("2026-08-01T12:00:00+00:00", 8.0, 0.7, 0.3),
            summary_at("2026-08-02T00:00:00+00:00", 6.0, 0.8, 0.2),
        ];
        let trends = analyze_trends(&history).unwrap();

        assert_eq!(trends.evaluations_count, 3);
        assert!((trends.time_span_hours - 24.0).abs() < 1e-9);
        assert!(trends.latency_trend.slope < 0.0);
        // Falling latency is progress.
        assert_eq!(trends.latency_trend.direction, "improving");
        assert!(trends.hit_rate_trend.slope > 0.0);
        assert_eq!(trends.hit_rate_trend.direction, "improving");
        assert!(trends.stability_analysis.overall_stability_score > 0.0);
    }

    #[test]
    fn rising_latency_and_hallucination_report_decline() {
        let history = vec![
            summary_at("2026-08-01T00:00:00+00:00", 5.0, 0.8, 0.1),
            summary_at("2026-08-01T12:00:00+00:00", 8.0, 0.7, 0.2),
            summary_at("2026-08-02T00:00:00+00:00", 12.0, 0.6, 0.4),
        ];
        let trends = analyze_trends(&history).unwrap();

        assert!(trends.latency_trend.slope > 0.0);
        assert_eq!(trends.latency_trend.direction, "declining");
        assert_eq!(trends.hallucination_trend.direction, "declining");
        assert_eq!(trends.hit_rate_trend.direction, "declining");
    }

    #[test]
    fn recommendations_fire_on_thresholds() {
        let results = vec![result("complex", 15.0, 0.4, 0.6, 0)];
        let recs = recommendations(&results);
        assert_eq!(recs.len(), 5);

        let good = vec![result("simple", 2.0, 0.9, 0.1, 2)];
        let recs = recommendations(&good);
        assert_eq!(recs, vec!["System performance is good - continue monitoring"]);
    }
}
