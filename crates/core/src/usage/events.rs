//! Usage event definitions.

use serde::{Deserialize, Serialize};

/// A structured usage event.
///
/// Indexer query events are emitted per originating indexer with grouped
/// counts, including for the cooldown-suppressed path (`cached: true`), so
/// total query volume stays observable even when no remote call was made.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UsageEvent {
    IndexerQuery {
        indexer: String,
        stream_id: String,
        duration_ms: u64,
        result_count: u32,
        /// The results were served from the local repository without a
        /// remote call.
        cached: bool,
    },
    IndexerQueryFailed {
        indexer: String,
        stream_id: String,
        duration_ms: u64,
        error_type: String,
        error_message: String,
    },
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },
}

impl UsageEvent {
    /// Stable event type name, used as a storage column.
    pub fn event_type(&self) -> &'static str {
        match self {
            UsageEvent::IndexerQuery { .. } => "indexer_query",
            UsageEvent::IndexerQueryFailed { .. } => "indexer_query_failed",
            UsageEvent::ServiceStarted { .. } => "service_started",
            UsageEvent::ServiceStopped { .. } => "service_stopped",
        }
    }

    /// Indexer this event is attributed to, if any.
    pub fn indexer(&self) -> Option<&str> {
        match self {
            UsageEvent::IndexerQuery { indexer, .. }
            | UsageEvent::IndexerQueryFailed { indexer, .. } => Some(indexer),
            _ => None,
        }
    }

    /// Stream identifier this event is attributed to, if any.
    pub fn stream_id(&self) -> Option<&str> {
        match self {
            UsageEvent::IndexerQuery { stream_id, .. }
            | UsageEvent::IndexerQueryFailed { stream_id, .. } => Some(stream_id),
            _ => None,
        }
    }
}
