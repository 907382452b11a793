use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::UsageEvent;

/// Envelope wrapping a usage event with its emission timestamp.
#[derive(Debug, Clone)]
pub struct UsageEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: UsageEvent,
}

/// Handle for emitting usage events.
///
/// Cheaply cloneable; events travel over an async channel to the
/// `UsageWriter`. Emission never fails the caller.
#[derive(Clone)]
pub struct UsageHandle {
    tx: mpsc::Sender<UsageEventEnvelope>,
}

impl UsageHandle {
    pub fn new(tx: mpsc::Sender<UsageEventEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an event, waiting for channel capacity if needed.
    pub async fn emit(&self, event: UsageEvent) {
        let envelope = UsageEventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("failed to emit usage event: {}", e);
        }
    }

    /// Emit an event without blocking. Used on hot paths where a full
    /// channel means the event is dropped rather than the request delayed.
    pub fn try_emit(&self, event: UsageEvent) -> bool {
        let envelope = UsageEventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("dropped usage event: {}", e);
                false
            }
        }
    }
}
