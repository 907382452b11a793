use std::sync::Arc;

use tokio::sync::mpsc;

use super::{UsageEventEnvelope, UsageHandle, UsageRecord, UsageStore};

/// Background task that drains usage events into storage.
pub struct UsageWriter {
    rx: mpsc::Receiver<UsageEventEnvelope>,
    store: Arc<dyn UsageStore>,
}

impl UsageWriter {
    pub fn new(rx: mpsc::Receiver<UsageEventEnvelope>, store: Arc<dyn UsageStore>) -> Self {
        Self { rx, store }
    }

    /// Run the writer, consuming events until every handle is dropped.
    ///
    /// Spawn this as a background task. A store failure is logged and the
    /// writer keeps draining; events are never allowed to back up into the
    /// request path.
    pub async fn run(mut self) {
        tracing::info!("usage writer started");

        while let Some(envelope) = self.rx.recv().await {
            let record = UsageRecord {
                id: 0, // assigned by the store
                timestamp: envelope.timestamp,
                event_type: envelope.event.event_type().to_string(),
                indexer: envelope.event.indexer().map(String::from),
                stream_id: envelope.event.stream_id().map(String::from),
                event: envelope.event,
            };

            if let Err(e) = self.store.insert(&record) {
                tracing::error!("failed to write usage event: {}", e);
            }
        }

        tracing::info!("usage writer shutting down");
    }
}

/// Create a complete usage pipeline.
///
/// Returns the clonable `UsageHandle` and the `UsageWriter` to spawn with
/// `tokio::spawn(writer.run())`.
pub fn create_usage_system(
    store: Arc<dyn UsageStore>,
    buffer_size: usize,
) -> (UsageHandle, UsageWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (UsageHandle::new(tx), UsageWriter::new(rx, store))
}
