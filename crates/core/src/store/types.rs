//! Types for backend store operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when talking to a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid magnet: {0}")]
    InvalidMagnet(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Per-hash cache status as reported by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnetStatus {
    /// The store knows nothing about this hash.
    Unknown,
    /// Queued for download on the store.
    Queued,
    /// Actively downloading on the store.
    Downloading,
    /// Downloaded to the user's store account.
    Downloaded,
    /// Instantly available from the store's shared cache.
    Cached,
}

impl MagnetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MagnetStatus::Unknown => "unknown",
            MagnetStatus::Queued => "queued",
            MagnetStatus::Downloading => "downloading",
            MagnetStatus::Downloaded => "downloaded",
            MagnetStatus::Cached => "cached",
        }
    }
}

/// A file inside a checked torrent, as reported by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFile {
    pub index: u32,
    pub path: String,
    pub name: String,
    pub size: u64,
}

/// Outcome of a cache-status check for one hash against one store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckedMagnet {
    /// Canonical lowercase hex info-hash.
    pub hash: String,
    pub status: MagnetStatus,
    /// Torrent name, when the store reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Total size in bytes, when known.
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<StoreFile>,
}

impl CheckedMagnet {
    /// An "the store has never heard of this" placeholder.
    pub fn unknown(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            status: MagnetStatus::Unknown,
            name: None,
            size: 0,
            files: Vec::new(),
        }
    }
}

/// An item tracked on a user's store account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreItem {
    pub id: String,
    pub hash: String,
    pub name: String,
    pub status: MagnetStatus,
    pub size: u64,
}

/// Parameters shared by status checks.
#[derive(Debug, Clone, Default)]
pub struct CheckStatusParams<'a> {
    /// End-user IP, forwarded so stores can apply their own fair-use rules.
    pub client_ip: Option<&'a str>,
    /// Stream identifier the batch belongs to, for store-side telemetry.
    pub stream_id: Option<&'a str>,
}

/// A backend content provider, treated as a black box.
///
/// `check_status` is what the resolution engine drives; the remaining
/// operations serve the surrounding add/stream surface and are kept thin.
/// Implementations must never panic on upstream failure; everything comes
/// back as a `StoreError` value.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Stable store identifier, used for attribution and cache keying.
    fn name(&self) -> &str;

    /// Report cache status for a batch of canonical info-hashes.
    ///
    /// The response carries one entry per input hash; hashes the store does
    /// not know come back as `MagnetStatus::Unknown`.
    async fn check_status(
        &self,
        api_key: &str,
        hashes: &[String],
        params: &CheckStatusParams<'_>,
    ) -> Result<Vec<CheckedMagnet>, StoreError>;

    /// Add a magnet to the user's store account.
    async fn add_item(&self, api_key: &str, magnet: &str) -> Result<StoreItem, StoreError>;

    /// Generate a direct download link for a file on the store.
    async fn generate_link(&self, api_key: &str, file_link: &str) -> Result<String, StoreError>;

    /// List items on the user's store account.
    async fn list_items(&self, api_key: &str) -> Result<Vec<StoreItem>, StoreError>;

    /// Remove an item from the user's store account.
    async fn remove_item(&self, api_key: &str, item_id: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnet_status_as_str() {
        assert_eq!(MagnetStatus::Cached.as_str(), "cached");
        assert_eq!(MagnetStatus::Unknown.as_str(), "unknown");
        assert_eq!(MagnetStatus::Downloading.as_str(), "downloading");
    }

    #[test]
    fn test_magnet_status_serialization() {
        assert_eq!(
            serde_json::to_string(&MagnetStatus::Cached).unwrap(),
            "\"cached\""
        );
        let parsed: MagnetStatus = serde_json::from_str("\"downloaded\"").unwrap();
        assert_eq!(parsed, MagnetStatus::Downloaded);
    }

    #[test]
    fn test_unknown_placeholder() {
        let item = CheckedMagnet::unknown("abc");
        assert_eq!(item.hash, "abc");
        assert_eq!(item.status, MagnetStatus::Unknown);
        assert!(item.files.is_empty());
    }

    #[test]
    fn test_checked_magnet_serialization_skips_empty() {
        let item = CheckedMagnet::unknown("abc");
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("files"));
        assert!(!json.contains("name"));
    }
}
