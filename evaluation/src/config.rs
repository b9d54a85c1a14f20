//! Evaluation run configuration.

use crate::error::EvalError;

/// Settings for one evaluation run.
#[derive(Clone, Debug)]
pub struct EvalConfig {
    /// Answer endpoint queried as a black box.
    pub endpoint: String,
    /// Per-query timeout in seconds.
    pub timeout_secs: u64,
    /// `max_results` forwarded with every query.
    pub max_results: u64,
    /// `similarity_threshold` forwarded with every query.
    pub similarity_threshold: f32,
    /// Directory receiving JSON/CSV artifacts.
    pub output_dir: String,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/api/v1/rag/query".to_string(),
            timeout_secs: 60,
            max_results: 5,
            similarity_threshold: 0.7,
            output_dir: "evaluation/results".to_string(),
        }
    }
}

impl EvalConfig {
    /// Reads overrides from the environment (`EVAL_ENDPOINT`,
    /// `EVAL_TIMEOUT_SECS`, `EVAL_OUTPUT_DIR`).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(endpoint) = std::env::var("EVAL_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                cfg.endpoint = endpoint;
            }
        }
        if let Ok(raw) = std::env::var("EVAL_TIMEOUT_SECS") {
            if let Ok(secs) = raw.trim().parse::<u64>() {
                cfg.timeout_secs = secs;
            }
        }
        if let Ok(dir) = std::env::var("EVAL_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                cfg.output_dir = dir;
            }
        }
        cfg
    }

    /// Validates config values.
    ///
    /// # Errors
    /// Returns `EvalError::Config` for empty or zero-valued fields.
    pub fn validate(&self) -> Result<(), EvalError> {
        if self.endpoint.trim().is_empty() {
            return Err(EvalError::Config("endpoint is empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(EvalError::Config("timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}
