//! Chunk ingestion: embed and upsert population chunks in batches.

use indicatif::{ProgressBar, ProgressStyle};
use qdrant_client::Payload;
use qdrant_client::qdrant::PointStruct;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use population_data::Chunk;

use crate::config::RagConfig;
use crate::embed::EmbeddingsProvider;
use crate::errors::RagError;
use crate::qdrant_facade::QdrantFacade;

/// Outcome of an ingestion run.
#[derive(Clone, Debug, Default)]
pub struct IngestReport {
    /// Chunks handed to the pipeline.
    pub attempted: usize,
    /// Chunks confirmed upserted.
    pub persisted: usize,
    /// Batches dropped after exhausting retries.
    pub failed_batches: usize,
}

/// Deterministic point id derived from the chunk id, so re-ingesting the
/// same `{state}_{year}` chunk overwrites rather than duplicates.
pub fn stable_uuid(chunk_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, chunk_id.as_bytes())
}

/// Embeds and upserts `chunks` into the configured collection.
///
/// The collection (with its payload indexes) is created if missing. Chunks
/// are processed in `cfg.upsert_batch`-sized batches; a batch whose
/// embedding or upsert fails is logged and skipped, and ingestion
/// continues with the next batch.
///
/// # Errors
/// Returns an error only for setup failures (collection creation). Batch
/// failures are reported through [`IngestReport::failed_batches`].
pub async fn index_chunks(
    facade: &QdrantFacade,
    provider: &dyn EmbeddingsProvider,
    cfg: &RagConfig,
    chunks: &[Chunk],
) -> Result<IngestReport, RagError> {
    let mut report = IngestReport {
        attempted: chunks.len(),
        ..Default::default()
    };
    if chunks.is_empty() {
        info!("No chunks to ingest");
        return Ok(report);
    }

    facade.ensure_collection(cfg.vector_size).await?;

    info!(
        "Ingesting {} chunks in batches of {}",
        chunks.len(),
        cfg.upsert_batch
    );
    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    for batch in chunks.chunks(cfg.upsert_batch) {
        match ingest_batch(facade, provider, batch).await {
            Ok(persisted) => report.persisted += persisted,
            Err(e) => {
                warn!("Skipping batch of {} chunks: {e}", batch.len());
                report.failed_batches += 1;
            }
        }
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();

    info!(
        "Ingestion complete: {}/{} chunks persisted, {} failed batches",
        report.persisted, report.attempted, report.failed_batches
    );
    Ok(report)
}

async fn ingest_batch(
    facade: &QdrantFacade,
    provider: &dyn EmbeddingsProvider,
    batch: &[Chunk],
) -> Result<usize, RagError> {
    let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
    let vectors = provider.embed_batch(&texts).await?;

    let mut points = Vec::with_capacity(batch.len());
    for (chunk, vector) in batch.iter().zip(vectors) {
        let payload = Payload::try_from(json!({
            "text": chunk.text,
            "metadata": chunk.metadata,
        }))
        .map_err(|e| RagError::Qdrant(e.to_string()))?;
        points.push(PointStruct::new(
            stable_uuid(&chunk.id).to_string(),
            vector,
            payload,
        ));
    }

    facade.upsert_points(points).await
}

/* ===== tests ===== */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_uuid_is_deterministic() {
        assert_eq!(stable_uuid("Selangor_2023"), stable_uuid("Selangor_2023"));
        assert_ne!(stable_uuid("Selangor_2023"), stable_uuid("Kedah_2023"));
    }
}
