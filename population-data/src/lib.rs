//! Population data ingestion front half: fetch → normalize → chunk.
//!
//! Two upstream feeds (the national aggregate feed and the columnar
//! per-state extract) are normalized into one tabular
//! [`DemographicRecord`] schema, then grouped by `(year, state)` and
//! synthesized into retrieval chunks with demographic breakdowns
//! (the Year-State-Demographic chunking strategy).

mod chunker;
mod errors;
mod fetch;
mod normalize;
mod record;

pub use chunker::{Chunk, ChunkMetadata, ChunkReport, Demographics, chunk_records};
pub use errors::DataError;
pub use fetch::FeedClient;
pub use normalize::{NormalizeReport, normalize_national, normalize_state};
pub use record::{
    BOTH_SEXES, DemographicRecord, NATIONAL_STATE, OVERALL, SOURCE_MALAYSIA_API,
    SOURCE_STATE_PARQUET, TARGET_STATES,
};
