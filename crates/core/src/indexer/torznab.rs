//! Direct-protocol indexer client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{IndexerError, IndexerResult, SearchIndexer, SearchQuery};

/// Client for a single indexer results endpoint.
pub struct TorznabIndexer {
    client: Client,
    name: String,
    endpoint: String,
    api_key: String,
}

impl TorznabIndexer {
    pub fn new(name: &str, endpoint: &str, api_key: &str) -> Result<Self, IndexerError> {
        reqwest::Url::parse(endpoint)
            .map_err(|e| IndexerError::invalid_config("url", e.to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| IndexerError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            name: name.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn build_search_url(&self, query: &SearchQuery) -> String {
        format!(
            "{}?apikey={}&Query={}",
            self.endpoint,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&query.query)
        )
    }
}

#[async_trait]
impl SearchIndexer for TorznabIndexer {
    fn identify(&self) -> String {
        format!("torznab/{}", self.name)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<IndexerResult>, IndexerError> {
        let url = self.build_search_url(query);
        debug!(indexer = %self.name, "searching indexer");

        let raw = fetch_results(&self.client, &url).await?;
        debug!(indexer = %self.name, results = raw.len(), "indexer search complete");

        let mut results: Vec<IndexerResult> = raw
            .into_iter()
            // Direct clients attribute every result to themselves.
            .map(|r| r.into_result(&self.name))
            .collect();
        if let Some(limit) = query.limit {
            results.truncate(limit as usize);
        }
        Ok(results)
    }
}

/// GET `url` and parse the common JSON results envelope.
pub(super) async fn fetch_results(
    client: &Client,
    url: &str,
) -> Result<Vec<RawResult>, IndexerError> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            IndexerError::Timeout
        } else if e.is_connect() {
            IndexerError::ConnectionFailed(e.to_string())
        } else {
            IndexerError::ApiError(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(IndexerError::ApiError(format!(
            "HTTP {}: {}",
            status,
            body.chars().take(200).collect::<String>()
        )));
    }

    let parsed: ResultsEnvelope = response
        .json()
        .await
        .map_err(|e| IndexerError::ApiError(format!("failed to parse response: {}", e)))?;
    Ok(parsed.results)
}

#[derive(Debug, Deserialize)]
pub(super) struct ResultsEnvelope {
    #[serde(rename = "Results", default)]
    pub results: Vec<RawResult>,
}

/// One upstream result before normalization.
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub(super) struct RawResult {
    pub Title: String,
    pub InfoHash: Option<String>,
    pub MagnetUri: Option<String>,
    pub Link: Option<String>,
    pub Size: Option<i64>,
    pub Seeders: Option<i32>,
    pub Peers: Option<i32>,
    pub Tracker: Option<String>,
    pub CategoryDesc: Option<String>,
    pub Type: Option<String>,
}

impl RawResult {
    pub(super) fn into_result(self, indexer: &str) -> IndexerResult {
        let seeders = self.Seeders.unwrap_or(0).max(0) as u32;
        IndexerResult {
            title: self.Title,
            info_hash: self.InfoHash.map(|h| h.to_lowercase()),
            size: self.Size.unwrap_or(0).max(0) as u64,
            seeders,
            leechers: self
                .Peers
                .unwrap_or(0)
                .saturating_sub(self.Seeders.unwrap_or(0))
                .max(0) as u32,
            indexer: indexer.to_string(),
            category: self.CategoryDesc,
            download_url: self.MagnetUri.or(self.Link),
            private: self.Type.as_deref() == Some("private"),
        }
    }

    /// Origin indexer tag carried by gateway responses.
    pub(super) fn tracker(&self) -> Option<&str> {
        self.Tracker.as_deref().filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify() {
        let indexer =
            TorznabIndexer::new("nyaa", "https://jackett.local/api/v2.0/indexers/nyaa/results", "k")
                .unwrap();
        assert_eq!(indexer.identify(), "torznab/nyaa");
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        assert!(TorznabIndexer::new("x", "not a url", "k").is_err());
    }

    #[test]
    fn test_build_search_url_encodes_query() {
        let indexer =
            TorznabIndexer::new("nyaa", "https://jackett.local/api/v2.0/indexers/nyaa/results", "k")
                .unwrap();
        let url = indexer.build_search_url(&SearchQuery::new("some query"));
        assert!(url.contains("Query=some%20query"));
        assert!(url.contains("apikey=k"));
    }

    #[test]
    fn test_raw_result_normalization() {
        let json = r#"{
            "Title": "Some.Release.1080p",
            "InfoHash": "DD8255ECDC7CA55FB0BBF81323D87062DB1F6D1C",
            "Size": 734003200,
            "Seeders": 12,
            "Peers": 15,
            "Tracker": "nyaa",
            "CategoryDesc": "Movies",
            "Type": "public"
        }"#;
        let raw: RawResult = serde_json::from_str(json).unwrap();
        let result = raw.into_result("mine");

        assert_eq!(
            result.info_hash.as_deref(),
            Some("dd8255ecdc7ca55fb0bbf81323d87062db1f6d1c")
        );
        assert_eq!(result.seeders, 12);
        assert_eq!(result.leechers, 3);
        assert_eq!(result.indexer, "mine");
        assert!(!result.private);
    }

    #[test]
    fn test_raw_result_negative_counts_clamped() {
        let json = r#"{"Title": "t", "Seeders": -1, "Peers": -5, "Size": -10}"#;
        let raw: RawResult = serde_json::from_str(json).unwrap();
        let result = raw.into_result("mine");
        assert_eq!(result.seeders, 0);
        assert_eq!(result.leechers, 0);
        assert_eq!(result.size, 0);
    }

    #[test]
    fn test_envelope_parsing_with_missing_results() {
        let envelope: ResultsEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.results.is_empty());
    }
}
