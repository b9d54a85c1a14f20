//! Error types for the evaluation engine.

use thiserror::Error;

/// Top-level error for evaluation runs.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Filesystem failures while reading queries or writing artifacts.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in the query set or a result file.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// HTTP client failures during query dispatch.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status from the answer endpoint.
    #[error("HTTP {status}: {snippet}")]
    Http {
        status: reqwest::StatusCode,
        snippet: String,
    },

    /// The query set file contained no queries.
    #[error("no evaluation queries loaded")]
    NoQueries,

    /// Every dispatched query failed; no aggregate can be computed.
    #[error("all evaluation queries failed")]
    AllQueriesFailed,

    /// Fewer than two historical snapshots; trends are undefined.
    #[error("insufficient historical data for trend analysis")]
    InsufficientHistory,
}

pub type Result<T> = std::result::Result<T, EvalError>;
