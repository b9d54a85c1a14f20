//! OpenAI-compatible HTTP client for chat completions and embeddings.
//!
//! Minimal, non-streaming client around the OpenAI REST API. Endpoints are
//! derived from [`ModelConfig::endpoint`]:
//! - `POST {endpoint}/v1/chat/completions` — chat completion (`stream=false`)
//! - `POST {endpoint}/v1/embeddings`       — embeddings retrieval
//!
//! Constructor validation:
//! - `cfg.api_key` must be present
//! - `cfg.endpoint` must start with http:// or https://
//!
//! Errors are normalized via the unified [`LlmError`] type.

use std::time::Duration;

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::ModelConfig;
use crate::error::{ConfigError, LlmError, Result, validate_http_endpoint};

/// One chat message in OpenAI wire format.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// `"system"` | `"user"` | `"assistant"`.
    pub role: &'static str,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Convenience constructor for a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    /// Convenience constructor for a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// A finished, non-streaming completion.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated assistant text.
    pub content: String,
    /// Token usage for the call.
    pub usage: TokenUsage,
}

/// Thin client for an OpenAI-compatible API.
///
/// Constructed from a complete [`ModelConfig`]. Internally keeps a
/// preconfigured `reqwest::Client` (timeout + default headers).
#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: ModelConfig,
    url_chat: String,
    url_embeddings: String,
}

impl OpenAiService {
    /// Creates a new [`OpenAiService`] from the given config.
    ///
    /// # Errors
    /// - [`ConfigError::MissingVar`] if `cfg.api_key` is `None`
    /// - [`ConfigError::InvalidFormat`] if `cfg.endpoint` is invalid
    /// - [`LlmError::Transport`] if the HTTP client cannot be built
    pub fn new(cfg: ModelConfig) -> Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .ok_or(ConfigError::MissingVar("OPENAI_API_KEY"))?;

        if cfg.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel.into());
        }
        validate_http_endpoint("OPENAI_BASE_URL", cfg.endpoint.trim())?;

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| LlmError::Decode(format!("invalid API key header: {e}")))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        let base = cfg.endpoint.trim().trim_end_matches('/').to_string();
        let url_chat = format!("{}/v1/chat/completions", base);
        let url_embeddings = format!("{}/v1/embeddings", base);

        Ok(Self {
            client,
            cfg,
            url_chat,
            url_embeddings,
        })
    }

    /// Performs a non-streaming chat completion.
    ///
    /// Mapped options:
    /// - `model`       ← `self.cfg.model`
    /// - `messages`    ← argument
    /// - `max_tokens`  ← `self.cfg.max_tokens`
    /// - `temperature` ← `self.cfg.temperature`
    ///
    /// # Errors
    /// - [`LlmError::HttpStatus`] for non-2xx responses
    /// - [`LlmError::Transport`] for client errors
    /// - [`LlmError::Decode`] if the response cannot be parsed
    /// - [`LlmError::EmptyResponse`] if no choices were returned
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<Completion> {
        let body = ChatRequest {
            model: &self.cfg.model,
            messages,
            stream: false,
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
        };

        debug!("POST {}", self.url_chat);
        let resp = self.client.post(&self.url_chat).json(&body).send().await?;
        let resp = check_status(resp, &self.url_chat).await?;

        let out: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(format!("serde error: {e}")))?;

        let choice = out.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        Ok(Completion {
            content: choice.message.content,
            usage: out.usage.unwrap_or_default(),
        })
    }

    /// Retrieves one embedding vector via `/v1/embeddings`.
    ///
    /// # Errors
    /// Same taxonomy as [`OpenAiService::chat`].
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embeddings_batch(std::slice::from_ref(&input)).await?;
        vectors.pop().ok_or(LlmError::EmptyResponse)
    }

    /// Retrieves embeddings for a batch of inputs, preserving order.
    ///
    /// All-or-nothing: a provider error fails the whole batch, no partial
    /// vectors are returned.
    ///
    /// # Errors
    /// Same taxonomy as [`OpenAiService::chat`].
    #[instrument(skip_all, fields(model = %self.cfg.model, count = inputs.len()))]
    pub async fn embeddings_batch<S: AsRef<str>>(&self, inputs: &[S]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            input: inputs.iter().map(|s| s.as_ref()).collect(),
        };

        debug!("POST {}", self.url_embeddings);
        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp, &self.url_embeddings).await?;

        let out: EmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(format!("serde error: {e}")))?;

        if out.data.len() != inputs.len() {
            return Err(LlmError::Decode(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                out.data.len()
            )));
        }

        // The API may return items out of order; `index` is authoritative.
        let mut data = out.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    /// Model identifier of this profile.
    pub fn model(&self) -> &str {
        &self.cfg.model
    }
}

/// Maps non-2xx responses to [`LlmError::HttpStatus`] with a body snippet.
async fn check_status(resp: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let snippet = text.chars().take(240).collect::<String>();
    Err(LlmError::HttpStatus {
        status,
        url: url.to_string(),
        snippet,
    })
}

/* ==========================
HTTP payloads
========================== */

/// Request body for `/v1/chat/completions` (non-streaming).
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Response body for `/v1/chat/completions` (minimal shape).
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Request body for `/v1/embeddings`.
#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

/// Response body for `/v1/embeddings`.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ModelConfig {
        ModelConfig {
            model: "text-embedding-ada-002".into(),
            endpoint: "https://api.openai.com/".into(),
            api_key: Some("sk-test".into()),
            max_tokens: Some(800),
            temperature: Some(0.3),
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn constructor_builds_urls_without_double_slash() {
        let svc = OpenAiService::new(cfg()).expect("service");
        assert_eq!(svc.url_chat, "https://api.openai.com/v1/chat/completions");
        assert_eq!(svc.url_embeddings, "https://api.openai.com/v1/embeddings");
    }

    #[test]
    fn constructor_rejects_missing_key_and_bad_endpoint() {
        let mut no_key = cfg();
        no_key.api_key = None;
        assert!(OpenAiService::new(no_key).is_err());

        let mut bad = cfg();
        bad.endpoint = "api.openai.com".into();
        assert!(OpenAiService::new(bad).is_err());
    }
}
