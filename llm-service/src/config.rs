//! Model invocation configuration.

use crate::error::{Result, env_opt, env_opt_u32, must_env, validate_http_endpoint};

/// Configuration for one LLM model invocation profile.
///
/// The same struct covers both chat and embedding profiles; the caller
/// decides which endpoint family to use.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Model identifier string (e.g., `"gpt-4o-mini"`, `"text-embedding-ada-002"`).
    pub model: String,

    /// API base URL (e.g., `https://api.openai.com`).
    pub endpoint: String,

    /// API key for authentication.
    pub api_key: Option<String>,

    /// Maximum number of tokens to generate (chat only).
    pub max_tokens: Option<u32>,

    /// Sampling temperature. Low values favor determinism over creativity.
    pub temperature: Option<f32>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}

impl ModelConfig {
    /// Chat profile read from the environment.
    ///
    /// Required: `OPENAI_API_KEY`. Optional: `OPENAI_BASE_URL`,
    /// `OPENAI_CHAT_MODEL`, `LLM_MAX_TOKENS`, `LLM_TIMEOUT_SECS`.
    ///
    /// # Errors
    /// Returns a config error on missing key or malformed numbers/URL.
    pub fn chat_from_env() -> Result<Self> {
        let endpoint =
            env_opt("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com".to_string());
        validate_http_endpoint("OPENAI_BASE_URL", &endpoint)?;
        Ok(Self {
            model: env_opt("OPENAI_CHAT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            endpoint,
            api_key: Some(must_env("OPENAI_API_KEY")?),
            max_tokens: Some(env_opt_u32("LLM_MAX_TOKENS")?.unwrap_or(800)),
            // Low temperature: grounded answers, not creative writing.
            temperature: Some(0.3),
            timeout_secs: Some(env_opt_u32("LLM_TIMEOUT_SECS")?.map(u64::from).unwrap_or(60)),
        })
    }

    /// Embedding profile read from the environment.
    ///
    /// Required: `OPENAI_API_KEY`. Optional: `OPENAI_BASE_URL`,
    /// `OPENAI_EMBEDDING_MODEL`, `LLM_TIMEOUT_SECS`.
    ///
    /// # Errors
    /// Returns a config error on missing key or malformed numbers/URL.
    pub fn embedding_from_env() -> Result<Self> {
        let endpoint =
            env_opt("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com".to_string());
        validate_http_endpoint("OPENAI_BASE_URL", &endpoint)?;
        Ok(Self {
            model: env_opt("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-ada-002".to_string()),
            endpoint,
            api_key: Some(must_env("OPENAI_API_KEY")?),
            max_tokens: None,
            temperature: None,
            timeout_secs: Some(env_opt_u32("LLM_TIMEOUT_SECS")?.map(u64::from).unwrap_or(30)),
        })
    }
}
