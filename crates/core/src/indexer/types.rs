//! Types for the search indexer system.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fallback attribution for gateway results that carry no origin tag.
pub const AGGREGATOR_FALLBACK: &str = "Aggregator (All)";

/// Errors that can occur during indexer operations.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Invalid indexer config ({field}): {message}")]
    InvalidConfig { field: String, message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IndexerError {
    pub fn invalid_config(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Closed set of indexer variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexerKind {
    /// Speaks the search protocol straight to one indexer endpoint.
    Torznab,
    /// Speaks the search protocol against a gateway that fans out to many
    /// indexers server-side.
    Aggregator,
}

impl IndexerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexerKind::Torznab => "torznab",
            IndexerKind::Aggregator => "aggregator",
        }
    }
}

/// Pattern of a direct results endpoint eligible for URL compression.
static TORZNAB_ENDPOINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://(.+)/api/v2\.0/indexers/([^/:]+)/results/?$").expect("valid regex")
});

/// Compressed-form marker. Kept short because these strings are stored
/// inside user configuration payloads.
const COMPRESSED_PREFIX: &str = "tz1:";

/// Configuration for one indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub name: String,
    pub kind: IndexerKind,
    /// Endpoint URL, possibly in compressed storage form.
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

impl IndexerConfig {
    /// Reversibly shrink the URL for storage. Idempotent: compressing an
    /// already-compressed URL is a no-op, and URLs that do not match the
    /// well-known endpoint shape pass through unchanged.
    pub fn compress(&mut self) {
        if self.kind != IndexerKind::Torznab || self.url.starts_with(COMPRESSED_PREFIX) {
            return;
        }
        if let Some(caps) = TORZNAB_ENDPOINT_RE.captures(&self.url) {
            let host = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let id = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            self.url = format!("{}{}:{}", COMPRESSED_PREFIX, host, id);
        }
    }

    /// Restore a compressed URL to its full endpoint form. Idempotent.
    pub fn decompress(&mut self) {
        let Some(compact) = self.url.strip_prefix(COMPRESSED_PREFIX) else {
            return;
        };
        // The indexer id never contains ':', so split from the right; the
        // host part may carry a port.
        if let Some((host, id)) = compact.rsplit_once(':') {
            self.url = format!("https://{}/api/v2.0/indexers/{}/results", host, id);
        }
    }

    /// Fail fast on configurations that cannot produce a working client.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.name.is_empty() {
            return Err(IndexerError::invalid_config("name", "indexer name is required"));
        }
        if self.url.is_empty() {
            return Err(IndexerError::invalid_config("url", "indexer url is required"));
        }

        let url = reqwest::Url::parse(&self.url)
            .map_err(|e| IndexerError::invalid_config("url", e.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(IndexerError::invalid_config(
                "url",
                format!("unsupported scheme: {}", url.scheme()),
            ));
        }
        if self.kind == IndexerKind::Torznab && !url.path().contains("/indexers/") {
            return Err(IndexerError::invalid_config(
                "url",
                "direct indexer url must point at a results endpoint",
            ));
        }
        Ok(())
    }
}

/// Free-text search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
        }
    }
}

/// One normalized search result, regardless of upstream shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerResult {
    pub title: String,
    /// Canonical lowercase hex info-hash, when the upstream reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub seeders: u32,
    #[serde(default)]
    pub leechers: u32,
    /// True origin indexer of this result.
    pub indexer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Magnet URI or .torrent download reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default)]
    pub private: bool,
}

/// A search indexer client.
#[async_trait]
pub trait SearchIndexer: Send + Sync {
    /// Stable identity for caching and attribution.
    fn identify(&self) -> String;

    /// Execute a search, returning normalized results.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<IndexerResult>, IndexerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torznab_config(url: &str) -> IndexerConfig {
        IndexerConfig {
            name: "nyaa".to_string(),
            kind: IndexerKind::Torznab,
            url: url.to_string(),
            api_key: "key".to_string(),
        }
    }

    #[test]
    fn test_compress_round_trip() {
        let full = "https://jackett.local:9117/api/v2.0/indexers/nyaa/results";
        let mut config = torznab_config(full);

        config.compress();
        assert_eq!(config.url, "tz1:jackett.local:9117:nyaa");

        config.decompress();
        assert_eq!(config.url, full);
    }

    #[test]
    fn test_compress_is_idempotent() {
        let mut config = torznab_config("https://jackett.local/api/v2.0/indexers/nyaa/results");
        config.compress();
        let once = config.url.clone();
        config.compress();
        assert_eq!(config.url, once);

        config.decompress();
        let restored = config.url.clone();
        config.decompress();
        assert_eq!(config.url, restored);
    }

    #[test]
    fn test_compress_passes_through_non_matching_urls() {
        let mut config = torznab_config("http://plain.local/api/v2.0/indexers/nyaa/results");
        config.compress();
        // http endpoints are not compressed; the transform stays lossless.
        assert!(config.url.starts_with("http://plain.local"));
    }

    #[test]
    fn test_aggregator_urls_are_never_compressed() {
        let mut config = IndexerConfig {
            name: "gateway".to_string(),
            kind: IndexerKind::Aggregator,
            url: "https://prowlarr.local:9696".to_string(),
            api_key: "key".to_string(),
        };
        config.compress();
        assert_eq!(config.url, "https://prowlarr.local:9696");
    }

    #[test]
    fn test_validate_rejects_missing_name() {
        let mut config = torznab_config("https://jackett.local/api/v2.0/indexers/nyaa/results");
        config.name = String::new();
        assert!(matches!(
            config.validate(),
            Err(IndexerError::InvalidConfig { field, .. }) if field == "name"
        ));
    }

    #[test]
    fn test_validate_rejects_unparseable_url() {
        let config = torznab_config("not a url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_wrong_shape_for_direct() {
        let config = torznab_config("https://jackett.local/");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_aggregator_base_url() {
        let config = IndexerConfig {
            name: "gateway".to_string(),
            kind: IndexerKind::Aggregator,
            url: "https://prowlarr.local:9696".to_string(),
            api_key: "key".to_string(),
        };
        assert!(config.validate().is_ok());
    }
}
