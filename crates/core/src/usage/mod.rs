//! Usage/telemetry event pipeline.
//!
//! Components emit structured events (indexer query volume, pull outcomes,
//! lifecycle) through a clonable `UsageHandle`; a background `UsageWriter`
//! drains the channel into a `UsageStore`. Emission is fire-and-forget by
//! construction: a full or closed channel is logged, never surfaced, and the
//! writer runs detached from any request's cancellation scope.

mod events;
mod handle;
mod sqlite;
mod store;
mod writer;

pub use events::UsageEvent;
pub use handle::{UsageEventEnvelope, UsageHandle};
pub use sqlite::SqliteUsageStore;
pub use store::{UsageError, UsageFilter, UsageRecord, UsageStore};
pub use writer::{create_usage_system, UsageWriter};
