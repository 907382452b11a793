//! Gateway indexer client.
//!
//! A single endpoint that fans out to many indexers server-side. Results come
//! back pre-merged, each tagged with the true origin indexer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::torznab::fetch_results;
use super::{IndexerError, IndexerResult, SearchIndexer, SearchQuery, AGGREGATOR_FALLBACK};

/// Client for an aggregator gateway's catch-all results endpoint.
pub struct AggregatorIndexer {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl AggregatorIndexer {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, IndexerError> {
        reqwest::Url::parse(base_url)
            .map_err(|e| IndexerError::invalid_config("url", e.to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| IndexerError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/api/v2.0/indexers/all/results",
                base_url.trim_end_matches('/')
            ),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl SearchIndexer for AggregatorIndexer {
    fn identify(&self) -> String {
        "aggregator/all".to_string()
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<IndexerResult>, IndexerError> {
        let url = format!(
            "{}?apikey={}&Query={}",
            self.endpoint,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&query.query)
        );
        debug!("searching aggregator gateway");

        let raw = fetch_results(&self.client, &url).await?;
        debug!(results = raw.len(), "aggregator search complete");

        let mut results: Vec<IndexerResult> = raw
            .into_iter()
            .map(|r| {
                // Attribute each result to its origin indexer when the
                // gateway tags one, otherwise to the shared fallback label.
                let origin = r
                    .tracker()
                    .unwrap_or(AGGREGATOR_FALLBACK)
                    .to_string();
                r.into_result(&origin)
            })
            .collect();
        if let Some(limit) = query.limit {
            results.truncate(limit as usize);
        }
        Ok(results)
    }
}
