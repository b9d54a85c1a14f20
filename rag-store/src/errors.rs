//! Unified error types for the crate.

use thiserror::Error;

/// Top-level error for rag-store operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Embedding provider failure. Hard failure for the enclosing
    /// batch/request; no partial vectors are ever accepted.
    #[error("embedding error: {0}")]
    Embedding(#[from] llm_service::LlmError),

    /// Mismatch in vector dimensionality across records.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Qdrant client errors (wrapped).
    #[error("qdrant error: {0}")]
    Qdrant(String),

    /// Provider exception during answer generation, surfaced to the caller
    /// as a single failure with the triggering message.
    #[error("query processing failed: {0}")]
    QueryPipeline(String),

    /// JSON conversion errors.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
