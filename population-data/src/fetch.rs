//! HTTP fetcher for the two upstream population feeds.
//!
//! Both feeds are served by the data.gov.my data-catalogue API as JSON
//! arrays of key-value records. The per-state dataset mirrors the columnar
//! parquet extract; jurisdiction filtering happens in the normalizer.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::errors::DataError;
use crate::record::{SOURCE_MALAYSIA_API, SOURCE_STATE_PARQUET};

const DEFAULT_CATALOGUE_URL: &str = "https://api.data.gov.my/data-catalogue";
const FETCH_LIMIT: u32 = 1000;

/// Client for the data-catalogue feeds.
pub struct FeedClient {
    client: reqwest::Client,
    catalogue_url: String,
}

impl FeedClient {
    /// Creates a client against the public catalogue endpoint.
    ///
    /// # Errors
    /// Returns [`DataError::Transport`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, DataError> {
        Self::with_base_url(DEFAULT_CATALOGUE_URL)
    }

    /// Creates a client against an explicit base URL (used by tests).
    ///
    /// # Errors
    /// Returns [`DataError::Transport`] if the HTTP client cannot be built.
    pub fn with_base_url(url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            catalogue_url: url.into(),
        })
    }

    /// Fetches the national aggregate feed (`population_malaysia`).
    ///
    /// # Errors
    /// Returns [`DataError::Fetch`] tagged `malaysia_api` on HTTP failure;
    /// the caller may still proceed with the other feed.
    pub async fn fetch_national(&self) -> Result<Vec<Value>, DataError> {
        info!("Fetching national population feed");
        self.fetch_dataset("population_malaysia", SOURCE_MALAYSIA_API)
            .await
    }

    /// Fetches the per-state extract (`population_state`).
    ///
    /// # Errors
    /// Returns [`DataError::Fetch`] tagged `state_parquet` on HTTP failure.
    pub async fn fetch_states(&self) -> Result<Vec<Value>, DataError> {
        info!("Fetching per-state population feed");
        self.fetch_dataset("population_state", SOURCE_STATE_PARQUET)
            .await
    }

    async fn fetch_dataset(
        &self,
        id: &str,
        feed: &'static str,
    ) -> Result<Vec<Value>, DataError> {
        debug!("GET {} id={id} limit={FETCH_LIMIT}", self.catalogue_url);
        let resp = self
            .client
            .get(&self.catalogue_url)
            .query(&[("id", id), ("limit", &FETCH_LIMIT.to_string())])
            .send()
            .await
            .map_err(|e| DataError::Fetch {
                feed,
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(DataError::Fetch {
                feed,
                reason: format!("HTTP {}", resp.status()),
            });
        }

        let rows: Vec<Value> = resp.json().await.map_err(|e| DataError::Fetch {
            feed,
            reason: format!("invalid JSON body: {e}"),
        })?;

        info!("Fetched {} rows for dataset {id}", rows.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_against_default_endpoint() {
        assert!(FeedClient::new().is_ok());
    }

    #[tokio::test]
    async fn unreachable_feed_yields_tagged_fetch_error() {
        // Port 1 refuses immediately; no external traffic involved.
        let client = FeedClient::with_base_url("http://127.0.0.1:1").unwrap();
        match client.fetch_national().await {
            Err(DataError::Fetch { feed, reason }) => {
                assert_eq!(feed, SOURCE_MALAYSIA_API);
                assert!(!reason.is_empty());
            }
            other => panic!("expected Fetch error, got {other:?}"),
        }
    }
}
