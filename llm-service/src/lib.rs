//! Shared LLM service for the population RAG backend.
//!
//! Provides a thin OpenAI-compatible HTTP client for chat completions and
//! embeddings, a unified error type, and a two-profile [`LlmService`]
//! (chat + embedding) that is constructed once at startup and passed by
//! reference to pipeline components. No ambient global clients.

pub mod config;
pub mod error;
pub mod openai;
pub mod service;

pub use config::ModelConfig;
pub use error::{LlmError, Result};
pub use openai::{ChatMessage, Completion, OpenAiService, TokenUsage};
pub use service::LlmService;
