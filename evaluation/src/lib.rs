//! End-to-end evaluation engine for the population RAG backend.
//!
//! Treats the answer endpoint as a black box: loads a query set, fans the
//! queries out concurrently, scores each response (latency, retrieval
//! hit-rate, hallucination heuristic, citations), aggregates, and writes
//! JSON/CSV artifacts. Historical snapshots feed trend analysis.

pub mod citations;
pub mod config;
pub mod error;
pub mod metrics;
pub mod queries;
pub mod report;
pub mod response;
pub mod runner;
pub mod scoring;
pub mod stats;

pub use citations::Citation;
pub use config::EvalConfig;
pub use error::{EvalError, Result};
pub use metrics::{ComprehensiveReport, QualityScore, TrendAnalysis};
pub use queries::{EvalQuery, load_queries};
pub use report::{load_historical, save_csv_report, save_results};
pub use runner::{EvaluationSummary, Evaluator, QueryEvaluation, QueryOutcome};
pub use scoring::{HallucinationConfig, HallucinationReport};
