//! Per-query scoring: retrieval hit-rate and hallucination heuristics.

use serde::{Deserialize, Serialize};

/// Phrases that signal the model is declining or hedging.
const UNCERTAINTY_PHRASES: &[&str] = &[
    "i don't have information",
    "i don't know",
    "information not available",
    "no data found",
    "cannot provide",
    "unable to answer",
    "i don't have access to",
    "i cannot find",
];

/// Fraction of expected sources found among the retrieved ones
/// (case-sensitive substring match).
///
/// Edge cases: nothing expected and nothing retrieved scores 1.0;
/// nothing expected but something retrieved scores 0.0.
pub fn retrieval_hit_rate(retrieved: &[String], expected: &[String]) -> f64 {
    if expected.is_empty() {
        return if retrieved.is_empty() { 1.0 } else { 0.0 };
    }
    let hits = expected
        .iter()
        .filter(|e| retrieved.iter().any(|r| r.contains(e.as_str())))
        .count();
    hits as f64 / expected.len() as f64
}

/// Tunable weights for the hallucination heuristic.
#[derive(Clone, Debug)]
pub struct HallucinationConfig {
    /// Added per uncertainty phrase found in the answer.
    pub uncertainty_penalty: f64,
    /// Added when the answer is short and mentions no expected fact.
    pub generic_penalty: f64,
    /// Length threshold (chars) below which an answer counts as short.
    pub generic_max_len: usize,
    /// Added when fact coverage falls below `fact_coverage_floor`.
    pub missing_facts_penalty: f64,
    /// Minimum fraction of expected facts that must be mentioned.
    pub fact_coverage_floor: f64,
    /// Subtracted for substantive answers that contain digits.
    pub numeric_bonus: f64,
    /// Length threshold (chars) for an answer to count as substantive.
    pub substantive_min_len: usize,
    /// Subtracted when the answer carries a citation marker.
    pub citation_bonus: f64,
    /// Scores above this are flagged as hallucinations.
    pub flag_threshold: f64,
}

impl Default for HallucinationConfig {
    fn default() -> Self {
        Self {
            uncertainty_penalty: 0.4,
            generic_penalty: 0.3,
            generic_max_len: 30,
            missing_facts_penalty: 0.2,
            fact_coverage_floor: 0.3,
            numeric_bonus: 0.2,
            substantive_min_len: 100,
            citation_bonus: 0.1,
            flag_threshold: 0.5,
        }
    }
}

/// Outcome of the hallucination heuristic for one answer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HallucinationReport {
    /// True when the clamped score exceeds the flag threshold.
    pub detected: bool,
    /// Additive score clamped to `[0, 1]`.
    pub confidence: f64,
    /// Human-readable tags for every rule that fired.
    pub issues: Vec<String>,
}

/// Scores one answer against the expected key facts.
///
/// Additive heuristic: uncertainty phrases and missing facts raise the
/// score, substantive numeric answers and citation markers lower it; the
/// result is clamped to `[0, 1]` before flagging.
pub fn score_hallucination(
    content: &str,
    expected_key_facts: &[String],
    cfg: &HallucinationConfig,
) -> HallucinationReport {
    let content_lower = content.to_lowercase();
    let mut score = 0.0;
    let mut issues = Vec::new();

    for phrase in UNCERTAINTY_PHRASES {
        if content_lower.contains(phrase) {
            score += cfg.uncertainty_penalty;
            issues.push(format!("uncertainty_phrase: {phrase}"));
        }
    }

    let mentions_any_fact = expected_key_facts
        .iter()
        .any(|f| content_lower.contains(&f.to_lowercase()));
    if content_lower.len() < cfg.generic_max_len && !mentions_any_fact {
        score += cfg.generic_penalty;
        issues.push("too_generic_response".to_string());
    }

    if !expected_key_facts.is_empty() {
        let facts_found = expected_key_facts
            .iter()
            .filter(|fact| {
                fact.to_lowercase()
                    .split_whitespace()
                    .any(|kw| kw.len() > 3 && content_lower.contains(kw))
            })
            .count();
        let coverage = facts_found as f64 / expected_key_facts.len() as f64;
        if coverage < cfg.fact_coverage_floor {
            score += cfg.missing_facts_penalty;
            issues.push(format!(
                "insufficient_expected_facts: {facts_found}/{}",
                expected_key_facts.len()
            ));
        }
    }

    if content_lower.chars().any(|c| c.is_ascii_digit())
        && content_lower.len() > cfg.substantive_min_len
    {
        score -= cfg.numeric_bonus;
    }
    if content_lower.contains("source:") || content_lower.contains("citation:") {
        score -= cfg.citation_bonus;
    }

    let confidence = score.clamp(0.0, 1.0);
    HallucinationReport {
        detected: confidence > cfg.flag_threshold,
        confidence,
        issues,
    }
}

/* ===== tests ===== */

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn hit_rate_empty_expected_and_retrieved_is_perfect() {
        assert_eq!(retrieval_hit_rate(&[], &[]), 1.0);
    }

    #[test]
    fn hit_rate_unexpected_retrieval_is_zero() {
        let retrieved = facts(&["malaysia_api"]);
        assert_eq!(retrieval_hit_rate(&retrieved, &[]), 0.0);
    }

    #[test]
    fn hit_rate_counts_matched_fraction() {
        let retrieved = facts(&["state_parquet", "unknown"]);
        let expected = facts(&["state_parquet", "malaysia_api"]);
        assert_eq!(retrieval_hit_rate(&retrieved, &expected), 0.5);
    }

    #[test]
    fn hit_rate_matches_substrings() {
        let retrieved = facts(&["derived_from_malaysia_api_v2"]);
        let expected = facts(&["malaysia_api"]);
        assert_eq!(retrieval_hit_rate(&retrieved, &expected), 1.0);
    }

    #[test]
    fn uncertainty_phrases_accumulate_and_clamp() {
        let cfg = HallucinationConfig::default();
        let content = "I don't know. I cannot find it. No data found. Unable to answer.";
        let report = score_hallucination(content, &[], &cfg);
        assert_eq!(report.confidence, 1.0);
        assert!(report.detected);
        assert!(report.issues.len() >= 3);
    }

    #[test]
    fn substantive_numeric_answer_clamps_at_zero() {
        let cfg = HallucinationConfig::default();
        let content = format!(
            "Source: state_parquet. The population of Kedah in 2023 was 2,100.5 \
             thousand people according to the official figures. {}",
            "More supporting narrative text. ".repeat(3)
        );
        let report = score_hallucination(&content, &facts(&["2,100.5", "Kedah"]), &cfg);
        assert_eq!(report.confidence, 0.0);
        assert!(!report.detected);
    }

    #[test]
    fn short_factless_answer_is_penalized() {
        let cfg = HallucinationConfig::default();
        let report = score_hallucination("It is large.", &facts(&["2,100.5"]), &cfg);
        // generic (0.3) + missing facts (0.2), no bonuses
        assert!((report.confidence - 0.5).abs() < 1e-9);
        assert!(!report.detected);
    }

    #[test]
    fn fact_keywords_shorter_than_four_chars_do_not_count() {
        let cfg = HallucinationConfig::default();
        let report = score_hallucination(
            "The 21 are all in the set of known values for it.",
            &facts(&["21 in set"]),
            &cfg,
        );
        assert!(
            report
                .issues
                .iter()
                .any(|i| i.starts_with("insufficient_expected_facts"))
        );
    }
}
