//! Embedding provider seam.
//!
//! Async trait with boxed futures so alternative backends (or test fakes)
//! can be plugged in without generics spreading through the pipeline.

use std::sync::Arc;
use std::{future::Future, pin::Pin};

use llm_service::LlmService;

use crate::errors::RagError;

/// Provider interface for embedding generation.
///
/// Implement this trait to plug in your own embedding backend.
pub trait EmbeddingsProvider: Send + Sync {
    /// Embeds one text.
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, RagError>> + Send + 'a>>;

    /// Embeds a batch of texts, preserving order and length.
    ///
    /// All-or-nothing: a provider error fails the whole batch.
    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, RagError>> + Send + 'a>>;
}

/// Embedding provider backed by the shared [`LlmService`].
///
/// Enforces the configured vector dimensionality on every result.
#[derive(Clone)]
pub struct LlmEmbedder {
    svc: Arc<LlmService>,
    dim: usize,
}

impl LlmEmbedder {
    /// Constructs a new embedder over the shared service.
    pub fn new(svc: Arc<LlmService>, dim: usize) -> Self {
        Self { svc, dim }
    }

    fn check_dim(&self, v: &[f32]) -> Result<(), RagError> {
        if v.len() != self.dim {
            return Err(RagError::VectorSizeMismatch {
                got: v.len(),
                want: self.dim,
            });
        }
        Ok(())
    }
}

impl EmbeddingsProvider for LlmEmbedder {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, RagError>> + Send + 'a>> {
        Box::pin(async move {
            let v = self.svc.embed(text).await?;
            self.check_dim(&v)?;
            Ok(v)
        })
    }

    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, RagError>> + Send + 'a>> {
        Box::pin(async move {
            let vectors = self.svc.embed_batch(texts).await?;
            for v in &vectors {
                self.check_dim(v)?;
            }
            Ok(vectors)
        })
    }
}
