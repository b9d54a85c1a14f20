//! Retrieval-augmented answering over indexed population chunks.

use std::time::Instant;
use std::{future::Future, pin::Pin};

use llm_service::{ChatMessage, LlmService, TokenUsage};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::RagConfig;
use crate::embed::EmbeddingsProvider;
use crate::errors::RagError;
use crate::filters::RagFilter;
use crate::qdrant_facade::QdrantFacade;
use crate::retrieve::{QueryResult, search_chunks};

/// Canonical refusal returned when retrieval yields no usable context.
pub const NO_CONTEXT_ANSWER: &str =
    "I don't have enough relevant information to answer this question.";

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that provides accurate information about Malaysian population data.";

const MAX_RESULTS_CAP: u64 = 20;

/// A user question with retrieval parameters.
#[derive(Clone, Debug)]
pub struct AnswerRequest {
    /// The natural-language question.
    pub query: String,
    /// Upper bound on retrieved chunks; clamped to `1..=20`.
    pub max_results: u64,
    /// Restrict retrieval to one state.
    pub filter_state: Option<String>,
    /// Restrict retrieval to one year.
    pub filter_year: Option<i64>,
    /// Minimum similarity score for a hit to count.
    pub similarity_threshold: f32,
}

impl AnswerRequest {
    /// A request with default retrieval parameters (5 hits, no filters,
    /// threshold 0.3).
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: 5,
            filter_state: None,
            filter_year: None,
            similarity_threshold: 0.3,
        }
    }

    fn effective_limit(&self) -> u64 {
        self.max_results.clamp(1, MAX_RESULTS_CAP)
    }

    fn filter(&self) -> RagFilter {
        RagFilter {
            state: self.filter_state.clone(),
            year: self.filter_year,
        }
    }
}

/// The grounded answer with confidence and provenance.
#[derive(Clone, Debug, Serialize)]
pub struct AnswerResponse {
    /// The question as asked.
    pub query: String,
    /// Generated answer, or the canonical refusal.
    pub answer: String,
    /// `min(context_chunks / 3, 1.0)`.
    pub confidence: f64,
    /// Distinct data sources of the context chunks, in retrieval order.
    pub sources: Vec<String>,
    /// Number of chunks used as context.
    pub context_chunks: usize,
    /// End-to-end latency in seconds.
    pub execution_time: f64,
    /// Diagnostic details: hit count, filters, token usage, top score.
    pub metadata: Value,
}

/// Seam for the text-generation step, so the pipeline can be exercised
/// without a live model.
pub trait AnswerGenerator: Send + Sync {
    /// Generates the answer text for an assembled prompt.
    fn generate<'a>(
        &'a self,
        system: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(String, TokenUsage), RagError>> + Send + 'a>>;
}

impl AnswerGenerator for LlmService {
    fn generate<'a>(
        &'a self,
        system: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(String, TokenUsage), RagError>> + Send + 'a>> {
        Box::pin(async move {
            let messages = [ChatMessage::system(system), ChatMessage::user(prompt)];
            let completion = self
                .chat(&messages)
                .await
                .map_err(|e| RagError::QueryPipeline(e.to_string()))?;
            Ok((completion.content, completion.usage))
        })
    }
}

/// Runs the full query pipeline: embed, search, assemble context,
/// generate.
///
/// A query with zero hits short-circuits to the canonical refusal with
/// zero confidence; the generator is not invoked.
///
/// # Errors
/// Returns `RagError::Embedding` / `RagError::Qdrant` for retrieval
/// failures and `RagError::QueryPipeline` when generation fails.
pub async fn respond(
    facade: &QdrantFacade,
    provider: &dyn EmbeddingsProvider,
    generator: &dyn AnswerGenerator,
    cfg: &RagConfig,
    req: &AnswerRequest,
) -> Result<AnswerResponse, RagError> {
    let started = Instant::now();
    info!("Processing query: {}", req.query);

    let hits = search_chunks(
        facade,
        provider,
        &req.query,
        req.effective_limit(),
        &req.filter(),
        req.similarity_threshold,
    )
    .await?;

    answer_from_hits(generator, cfg, req, hits, started).await
}

/// Second half of the pipeline, split out so tests can inject hits.
async fn answer_from_hits(
    generator: &dyn AnswerGenerator,
    cfg: &RagConfig,
    req: &AnswerRequest,
    hits: Vec<QueryResult>,
    started: Instant,
) -> Result<AnswerResponse, RagError> {
    if hits.is_empty() {
        debug!("No chunks above threshold; returning refusal");
        return Ok(AnswerResponse {
            query: req.query.clone(),
            answer: NO_CONTEXT_ANSWER.to_string(),
            confidence: 0.0,
            sources: Vec::new(),
            context_chunks: 0,
            execution_time: started.elapsed().as_secs_f64(),
            metadata: json!({
                "search_results": 0,
                "filter_conditions": req.filter().describe(),
            }),
        });
    }

    let context = build_context(&hits, cfg.context_max_chars);
    let prompt = build_prompt(&req.query, &context);
    let (answer, usage) = generator.generate(SYSTEM_PROMPT, &prompt).await?;

    let sources = distinct_sources(&hits);
    let top_score = hits.first().map(|h| h.score).unwrap_or(0.0);
    let confidence = answer_confidence(hits.len());

    info!(
        "Query answered with {} chunks, confidence {confidence:.2}",
        hits.len()
    );
    Ok(AnswerResponse {
        query: req.query.clone(),
        answer,
        confidence,
        sources,
        context_chunks: hits.len(),
        execution_time: started.elapsed().as_secs_f64(),
        metadata: json!({
            "search_results": hits.len(),
            "filter_conditions": req.filter().describe(),
            "usage": usage,
            "top_score": top_score,
        }),
    })
}

/// Joins chunk texts with blank lines and truncates to the character
/// budget, appending `...` when cut.
fn build_context(hits: &[QueryResult], max_chars: usize) -> String {
    let joined = hits
        .iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    if joined.len() <= max_chars {
        return joined;
    }
    let mut cut = max_chars;
    while !joined.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &joined[..cut])
}

fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "Context information is provided below. Use this context to answer the user's \
         question accurately. If the context doesn't contain the information needed, say so clearly.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Instructions:\n\
         1. Base your answer only on the provided context\n\
         2. Include specific numbers and percentages when available\n\
         3. Cite the data source when possible\n\
         4. If information is not in the context, say \"I don't have enough information to answer this question\"\n\
         5. Be concise but thorough\n\
         6. Use thousands (k) or millions for large numbers as appropriate\n\
         \n\
         User Question: {query}"
    )
}

/// More supporting chunks raise confidence, saturating at three.
fn answer_confidence(chunks: usize) -> f64 {
    (chunks as f64 / 3.0).min(1.0)
}

/// Distinct hit sources in first-seen order.
fn distinct_sources(hits: &[QueryResult]) -> Vec<String> {
    let mut seen = Vec::new();
    for hit in hits {
        if !seen.contains(&hit.source) {
            seen.push(hit.source.clone());
        }
    }
    seen
}

/* ===== tests ===== */

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockGenerator {
        calls: AtomicUsize,
        reply: String,
    }

    impl MockGenerator {
        fn new(reply: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply: reply.to_string(),
            }
        }
    }

    impl AnswerGenerator for MockGenerator {
        fn generate<'a>(
            &'a self,
            _system: &'a str,
            _prompt: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<(String, TokenUsage), RagError>> + Send + 'a>>
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.reply.clone();
            Box::pin(async move { Ok((reply, TokenUsage::default())) })
        }
    }

    fn hit(text: &str, score: f32, source: &str) -> QueryResult {
        QueryResult {
            text: text.to_string(),
            score,
            metadata: json!({"data_source": source}),
            source: source.to_string(),
        }
    }

    #[tokio::test]
    async fn zero_hits_refuse_without_calling_generator() {
        let generator = MockGenerator::new("should not appear");
        let cfg = RagConfig::new_default("http://localhost:6334", "test");
        let req = AnswerRequest::new("What is the population of Atlantis?");

        let resp = answer_from_hits(&generator, &cfg, &req, Vec::new(), Instant::now())
            .await
            .unwrap();

        assert_eq!(resp.answer, NO_CONTEXT_ANSWER);
        assert_eq!(resp.confidence, 0.0);
        assert!(resp.sources.is_empty());
        assert_eq!(resp.context_chunks, 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn confidence_scales_with_chunk_count() {
        let generator = MockGenerator::new("Kedah had 2,100k people in 2023.");
        let cfg = RagConfig::new_default("http://localhost:6334", "test");
        let req = AnswerRequest::new("Population of Kedah in 2023?");

        let hits = vec![
            hit("Population data for Kedah in 2023.", 0.9, "state_parquet"),
            hit("Population data for Kedah in 2022.", 0.8, "state_parquet"),
        ];
        let resp = answer_from_hits(&generator, &cfg, &req, hits, Instant::now())
            .await
            .unwrap();

        assert!((resp.confidence - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(resp.context_chunks, 2);
        assert_eq!(resp.sources, vec!["state_parquet".to_string()]);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn confidence_saturates_at_one() {
        let generator = MockGenerator::new("answer");
        let cfg = RagConfig::new_default("http://localhost:6334", "test");
        let req = AnswerRequest::new("q");

        let hits = (0..5)
            .map(|i| hit(&format!("chunk {i}"), 0.9, "malaysia_api"))
            .collect();
        let resp = answer_from_hits(&generator, &cfg, &req, hits, Instant::now())
            .await
            .unwrap();
        assert_eq!(resp.confidence, 1.0);
    }

    #[test]
    fn context_is_truncated_with_ellipsis() {
        let hits = vec![hit(&"a".repeat(4000), 0.9, "malaysia_api")];
        let ctx = build_context(&hits, 3000);
        assert_eq!(ctx.len(), 3003);
        assert!(ctx.ends_with("..."));
    }

    #[test]
    fn short_context_is_untouched() {
        let hits = vec![
            hit("first chunk", 0.9, "a"),
            hit("second chunk", 0.8, "b"),
        ];
        assert_eq!(build_context(&hits, 3000), "first chunk\n\nsecond chunk");
    }

    #[test]
    fn sources_are_deduplicated_in_order() {
        let hits = vec![
            hit("x", 0.9, "state_parquet"),
            hit("y", 0.8, "malaysia_api"),
            hit("z", 0.7, "state_parquet"),
        ];
        assert_eq!(
            distinct_sources(&hits),
            vec!["state_parquet".to_string(), "malaysia_api".to_string()]
        );
    }

    #[test]
    fn max_results_is_clamped() {
        let mut req = AnswerRequest::new("q");
        req.max_results = 0;
        assert_eq!(req.effective_limit(), 1);
        req.max_results = 100;
        assert_eq!(req.effective_limit(), 20);
    }
}
