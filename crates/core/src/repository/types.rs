//! Types for the torrent metadata repository.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A file within a stored torrent, with per-store source attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub index: u32,
    pub path: String,
    pub name: String,
    pub size: u64,
    /// Which store or indexer reported this file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

/// One torrent metadata record, keyed by info-hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentInfoRecord {
    /// Canonical lowercase hex info-hash.
    pub hash: String,
    pub title: String,
    /// Total size in bytes; 0 when still unknown.
    #[serde(default)]
    pub size: u64,
    /// Name of the indexer this record came from.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub indexer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leechers: Option<u32>,
    #[serde(default)]
    pub private: bool,
}

impl TorrentInfoRecord {
    /// A minimal record carrying only the hash.
    pub fn bare(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            title: String::new(),
            size: 0,
            indexer: String::new(),
            category: None,
            files: Vec::new(),
            seeders: None,
            leechers: None,
            private: false,
        }
    }
}
