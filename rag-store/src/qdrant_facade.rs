//! Thin adapter around `qdrant-client` to isolate API usage.
//!
//! This facade concentrates all Qdrant interactions behind a minimal API,
//! hiding the verbose builder pattern and keeping the rest of the
//! application decoupled from `qdrant-client`. Collection setup and upsert
//! apply a fixed small retry count with brief fixed backoff.

use std::time::Duration;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance, FieldType, Filter,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use tracing::{debug, info, warn};

use crate::config::RagConfig;
use crate::errors::RagError;

/// Payload fields carrying secondary indexes for filtered search.
const INDEXED_FIELDS: &[(&str, FieldType)] = &[
    ("metadata.state", FieldType::Keyword),
    ("metadata.year", FieldType::Integer),
];

/// A facade over the Qdrant client.
///
/// Encapsulates the underlying client, the target collection name, and the
/// retry policy for write-side operations.
pub struct QdrantFacade {
    client: Qdrant,
    collection: String,
    max_retries: usize,
    backoff: Duration,
}

impl QdrantFacade {
    /// Creates a new facade from the given configuration.
    ///
    /// # Errors
    /// Returns `RagError::Config` on invalid config and `RagError::Qdrant`
    /// if client initialization fails.
    pub fn new(cfg: &RagConfig) -> Result<Self, RagError> {
        cfg.validate()?;

        let mut builder = Qdrant::from_url(&cfg.qdrant_url);
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| RagError::Qdrant(e.to_string()))?;

        Ok(Self {
            client,
            collection: cfg.collection.clone(),
            max_retries: cfg.max_retries.max(1),
            backoff: Duration::from_secs(cfg.retry_backoff_secs),
        })
    }

    /// Ensures that the collection exists with the expected vector space
    /// and that the `metadata.state` / `metadata.year` payload indexes are
    /// in place. Idempotent; an infrastructure prerequisite for filtered
    /// search, not optional.
    ///
    /// # Errors
    /// Returns `RagError::Qdrant` after the retry budget is exhausted.
    pub async fn ensure_collection(&self, vector_size: usize) -> Result<(), RagError> {
        info!(
            "Ensuring collection '{}' with size={vector_size}",
            self.collection
        );

        let mut last_err = None;
        for attempt in 1..=self.max_retries {
            match self.ensure_collection_once(vector_size).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        "Collection setup attempt {attempt}/{} failed: {e}",
                        self.max_retries
                    );
                    last_err = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| RagError::Qdrant("collection setup failed".into())))
    }

    async fn ensure_collection_once(&self, vector_size: usize) -> Result<(), RagError> {
        match self.client.collection_info(&self.collection).await {
            Ok(_) => {
                debug!("Collection '{}' already exists", self.collection);
                return Ok(());
            }
            Err(err) => {
                debug!(
                    "Collection '{}' not found, will be created (error={err})",
                    self.collection
                );
            }
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(vector_size as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;

        for (field, field_type) in INDEXED_FIELDS {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &self.collection,
                    *field,
                    *field_type,
                ))
                .await
                .map_err(|e| RagError::Qdrant(format!("index on {field}: {e}")))?;
        }

        info!("Collection '{}' created with payload indexes", self.collection);
        Ok(())
    }

    /// Upserts a batch of points, retrying on failure.
    ///
    /// Returns the number of points persisted (the batch size on success).
    ///
    /// # Errors
    /// Returns `RagError::Qdrant` after the retry budget is exhausted.
    pub async fn upsert_points(&self, points: Vec<PointStruct>) -> Result<usize, RagError> {
        if points.is_empty() {
            debug!("No points provided for upsert");
            return Ok(0);
        }
        let count = points.len();

        let mut last_err = None;
        for attempt in 1..=self.max_retries {
            match self
                .client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points.clone()))
                .await
            {
                Ok(_) => {
                    debug!("Upserted {count} points into '{}'", self.collection);
                    return Ok(count);
                }
                Err(e) => {
                    warn!(
                        "Upsert attempt {attempt}/{} failed: {e}",
                        self.max_retries
                    );
                    last_err = Some(RagError::Qdrant(e.to_string()));
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| RagError::Qdrant("upsert failed".into())))
    }

    /// Performs a similarity search bounded by `limit` and a minimum
    /// similarity `score_threshold`.
    ///
    /// Returns `(score, payload)` tuples sorted by score.
    ///
    /// # Errors
    /// Returns `RagError::Qdrant` on client failures.
    pub async fn search(
        &self,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<Filter>,
        score_threshold: f32,
    ) -> Result<Vec<(f32, serde_json::Value)>, RagError> {
        debug!(
            "Searching '{}' limit={limit} threshold={score_threshold} filtered={}",
            self.collection,
            filter.is_some()
        );

        let mut builder = SearchPointsBuilder::new(&self.collection, vector, limit)
            .with_payload(true)
            .score_threshold(score_threshold);
        if let Some(f) = filter {
            builder = builder.filter(f);
        }

        let res = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;

        let mut out = Vec::with_capacity(res.result.len());
        for point in res.result {
            let score = point.score;
            let mut map = serde_json::Map::new();
            for (k, v) in point.payload {
                map.insert(k, v.into_json());
            }
            out.push((score, serde_json::Value::Object(map)));
        }

        debug!("Search completed: {} hits returned", out.len());
        Ok(out)
    }
}
