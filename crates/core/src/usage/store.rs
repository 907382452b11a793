use chrono::{DateTime, Utc};
use thiserror::Error;

use super::UsageEvent;

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A persisted usage event.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub indexer: Option<String>,
    pub stream_id: Option<String>,
    pub event: UsageEvent,
}

/// Filter for querying usage records.
#[derive(Debug, Clone)]
pub struct UsageFilter {
    pub event_type: Option<String>,
    pub indexer: Option<String>,
    pub stream_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for UsageFilter {
    fn default() -> Self {
        Self {
            event_type: None,
            indexer: None,
            stream_id: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl UsageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_indexer(mut self, indexer: impl Into<String>) -> Self {
        self.indexer = Some(indexer.into());
        self
    }

    pub fn with_stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Trait for usage event storage.
pub trait UsageStore: Send + Sync {
    /// Insert a usage record, returning the assigned id.
    fn insert(&self, record: &UsageRecord) -> Result<i64, UsageError>;

    /// Query usage records with optional filters.
    fn query(&self, filter: &UsageFilter) -> Result<Vec<UsageRecord>, UsageError>;

    /// Count matching usage records.
    fn count(&self, filter: &UsageFilter) -> Result<i64, UsageError>;
}
