//! Qdrant-backed chunk store with retrieval-augmented answering.
//!
//! Pipeline:
//! 1. `ingest` — embed population chunks in batches and upsert them with
//!    stable ids, creating the collection and payload indexes on demand.
//! 2. `retrieve` — embed a query and run filtered similarity search.
//! 3. `answer` — assemble a bounded context window, prompt the chat model
//!    and return a grounded answer with confidence and sources.
//!
//! [`RagStore`] wires the pieces together for callers that want the whole
//! pipeline; the modules stay usable on their own.

pub mod answer;
pub mod config;
pub mod embed;
pub mod errors;
pub mod filters;
pub mod ingest;
pub mod qdrant_facade;
pub mod retrieve;

use std::sync::Arc;

use llm_service::LlmService;

pub use answer::{AnswerRequest, AnswerResponse, NO_CONTEXT_ANSWER};
pub use config::RagConfig;
pub use embed::{EmbeddingsProvider, LlmEmbedder};
pub use errors::RagError;
pub use filters::RagFilter;
pub use ingest::IngestReport;
pub use qdrant_facade::QdrantFacade;
pub use retrieve::QueryResult;

/// Facade over the full ingestion and answering pipeline.
pub struct RagStore {
    cfg: RagConfig,
    facade: QdrantFacade,
    embedder: LlmEmbedder,
    llm: Arc<LlmService>,
}

impl RagStore {
    /// Builds the store from a config and a shared LLM service.
    ///
    /// # Errors
    /// Returns `RagError::Config` or `RagError::Qdrant` when the client
    /// cannot be constructed.
    pub fn new(cfg: RagConfig, llm: Arc<LlmService>) -> Result<Self, RagError> {
        let facade = QdrantFacade::new(&cfg)?;
        let embedder = LlmEmbedder::new(llm.clone(), cfg.vector_size);
        Ok(Self {
            cfg,
            facade,
            embedder,
            llm,
        })
    }

    /// Embeds and persists chunks, creating the collection if missing.
    ///
    /// # Errors
    /// Fails only on collection setup; batch failures are counted in the
    /// report.
    pub async fn ingest_chunks(
        &self,
        chunks: &[population_data::Chunk],
    ) -> Result<IngestReport, RagError> {
        ingest::index_chunks(&self.facade, &self.embedder, &self.cfg, chunks).await
    }

    /// Answers a question grounded in the indexed chunks.
    ///
    /// # Errors
    /// Propagates retrieval and generation failures.
    pub async fn answer(&self, req: &AnswerRequest) -> Result<AnswerResponse, RagError> {
        answer::respond(
            &self.facade,
            &self.embedder,
            self.llm.as_ref(),
            &self.cfg,
            req,
        )
        .await
    }

    /// Raw similarity search without answer generation.
    ///
    /// # Errors
    /// Propagates embedding and store failures.
    pub async fn search(
        &self,
        query: &str,
        limit: u64,
        filter: &RagFilter,
        score_threshold: f32,
    ) -> Result<Vec<QueryResult>, RagError> {
        retrieve::search_chunks(
            &self.facade,
            &self.embedder,
            query,
            limit,
            filter,
            score_threshold,
        )
        .await
    }
}
