//! Types for the multi-store cache status checker.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{MagnetStatus, StoreBackend, StoreFile};

/// Errors that abort a cache status check outright.
///
/// Per-store failures do not appear here; they degrade the outcome and are
/// reported in [`CheckOutcome::store_errors`].
#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("No store is configured")]
    NoConfiguredStore,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// One configured store with its credential and merge priority.
///
/// Lower priority values win ties during result merging.
#[derive(Clone)]
pub struct StoreHandle {
    pub store: Arc<dyn StoreBackend>,
    pub api_key: String,
    pub priority: u32,
}

impl StoreHandle {
    pub fn new(store: Arc<dyn StoreBackend>, api_key: impl Into<String>, priority: u32) -> Self {
        Self {
            store,
            api_key: api_key.into(),
            priority,
        }
    }
}

/// Final per-hash verdict after merging every store's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatusResult {
    pub hash: String,
    pub status: MagnetStatus,
    /// Which store produced the winning answer, when any did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<StoreFile>,
}

impl CacheStatusResult {
    pub fn unknown(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            status: MagnetStatus::Unknown,
            store: None,
            files: Vec::new(),
        }
    }

    pub fn is_cached(&self) -> bool {
        self.status == MagnetStatus::Cached
    }
}

/// Outcome of one check: per-hash verdicts in input order, plus any store
/// failures encountered along the way.
#[derive(Debug, Default)]
pub struct CheckOutcome {
    pub results: Vec<CacheStatusResult>,
    /// Store name -> error message, for stores that failed to answer.
    pub store_errors: HashMap<String, String>,
}
