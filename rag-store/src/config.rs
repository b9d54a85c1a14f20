//! Runtime and collection configuration.

use crate::errors::RagError;

/// Configuration for chunk indexing and retrieval.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Qdrant endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Target collection name.
    pub collection: String,
    /// Vector dimensionality (1536 for `text-embedding-ada-002`).
    pub vector_size: usize,
    /// Upsert batch size; bounds peak memory and request size.
    pub upsert_batch: usize,
    /// Character budget for the concatenated LLM context window.
    pub context_max_chars: usize,
    /// Attempts for collection setup and upsert operations.
    pub max_retries: usize,
    /// Fixed backoff between retries, in seconds.
    pub retry_backoff_secs: u64,
}

impl RagConfig {
    /// Creates a sane default config for a given collection name and
    /// Qdrant endpoint.
    pub fn new_default(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            collection: collection.into(),
            vector_size: 1536,
            upsert_batch: 50,
            context_max_chars: 3000,
            max_retries: 3,
            retry_backoff_secs: 2,
        }
    }

    /// Reads the config from the environment (`QDRANT_URL`,
    /// `QDRANT_API_KEY`, `QDRANT_COLLECTION`), falling back to local
    /// defaults.
    pub fn from_env() -> Self {
        let url =
            std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6334".to_string());
        let collection = std::env::var("QDRANT_COLLECTION")
            .unwrap_or_else(|_| "dosm_population_data".to_string());
        let mut cfg = Self::new_default(url, collection);
        cfg.qdrant_api_key = std::env::var("QDRANT_API_KEY").ok().filter(|k| !k.is_empty());
        cfg
    }

    /// Validates config values.
    ///
    /// # Errors
    /// Returns `RagError::Config` for empty or zero-valued fields.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.qdrant_url.trim().is_empty() {
            return Err(RagError::Config("qdrant_url is empty".into()));
        }
        if self.collection.trim().is_empty() {
            return Err(RagError::Config("collection is empty".into()));
        }
        if self.vector_size == 0 {
            return Err(RagError::Config("vector_size must be > 0".into()));
        }
        if self.upsert_batch == 0 {
            return Err(RagError::Config("upsert_batch must be > 0".into()));
        }
        Ok(())
    }
}
