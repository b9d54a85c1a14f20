//! Shared LLM service with two active profiles: `chat` and `embedding`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Each profile owns a preconfigured HTTP client.

use crate::config::ModelConfig;
use crate::error::Result;
use crate::openai::{ChatMessage, Completion, OpenAiService};

/// Shared service that manages two logical LLM profiles: **chat** and
/// **embedding**.
#[derive(Debug)]
pub struct LlmService {
    chat: OpenAiService,
    embedding: OpenAiService,
}

impl LlmService {
    /// Creates a new service with both profiles.
    ///
    /// # Errors
    /// Returns a config/transport error if either client cannot be built.
    pub fn new(chat: ModelConfig, embedding: ModelConfig) -> Result<Self> {
        Ok(Self {
            chat: OpenAiService::new(chat)?,
            embedding: OpenAiService::new(embedding)?,
        })
    }

    /// Builds both profiles from the environment.
    ///
    /// # Errors
    /// Returns a config error on missing/invalid environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ModelConfig::chat_from_env()?, ModelConfig::embedding_from_env()?)
    }

    /// Generates a chat completion using the **chat** profile.
    ///
    /// # Errors
    /// Propagates provider errors unchanged; no partial completion is returned.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<Completion> {
        self.chat.chat(messages).await
    }

    /// Computes one embedding using the **embedding** profile.
    ///
    /// # Errors
    /// Propagates provider errors unchanged.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>> {
        self.embedding.embeddings(input).await
    }

    /// Computes embeddings for a batch of texts, preserving order.
    ///
    /// All-or-nothing: a provider error fails the whole batch.
    ///
    /// # Errors
    /// Propagates provider errors unchanged.
    pub async fn embed_batch<S: AsRef<str>>(&self, inputs: &[S]) -> Result<Vec<Vec<f32>>> {
        self.embedding.embeddings_batch(inputs).await
    }

    /// Model identifiers of the `(chat, embedding)` profiles.
    pub fn models(&self) -> (&str, &str) {
        (self.chat.model(), self.embedding.model())
    }
}
