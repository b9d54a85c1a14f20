//! Unified error types for the crate.

use thiserror::Error;

/// Top-level error for population-data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Upstream source unreachable or returned a non-2xx status.
    ///
    /// Aborts that source only; the other feed may still be ingested.
    #[error("fetch error for {feed}: {reason}")]
    Fetch {
        /// Which feed failed (e.g., `malaysia_api`).
        feed: &'static str,
        /// Human-readable failure reason.
        reason: String,
    },

    /// HTTP transport error.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON parsing / serialization errors.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
