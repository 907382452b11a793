//! Types for the peer sync layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Tunables for peer synchronization.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long a stream's pull result is considered fresh; pulls for the
    /// same stream inside this window are skipped.
    pub pull_cooldown: Duration,
    /// A successful peer call slower than this still trips the halt window.
    pub slow_call_threshold: Duration,
    /// How long peer calls stay halted after a failure or slow call.
    pub halt_window: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            pull_cooldown: Duration::from_secs(300),
            slow_call_threshold: Duration::from_secs(25),
            halt_window: Duration::from_secs(10),
        }
    }
}

/// Per-process identity and degradation state.
///
/// `local_only` is a one-way latch: once a pull loop is detected the process
/// stops calling its peer for its remaining lifetime.
#[derive(Debug)]
pub struct RuntimeContext {
    instance_id: String,
    local_only: AtomicBool,
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            local_only: AtomicBool::new(false),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn is_local_only(&self) -> bool {
        self.local_only.load(Ordering::Relaxed)
    }

    /// Latch the process into local-only mode. Logs only on the transition.
    pub fn enter_local_only(&self, reason: &str) {
        if !self.local_only.swap(true, Ordering::Relaxed) {
            warn!(reason, "peer loop detected, staying local-only from now on");
        }
    }
}

/// Remembers which streams were pulled recently.
pub struct CooldownTracker {
    pulled: TtlCache<String, Instant>,
}

impl CooldownTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            pulled: TtlCache::new("sync:pulled", cooldown),
        }
    }

    /// Whether a pull for this stream is due.
    pub fn should_pull(&self, stream_id: &str) -> bool {
        self.pulled.get(&stream_id.to_string()).is_none()
    }

    pub fn mark_pulled(&self, stream_id: &str) {
        self.pulled.add(stream_id.to_string(), Instant::now());
    }
}

/// What happened to a pull attempt, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullStatus {
    /// The peer answered; this many records were ingested.
    Pulled(usize),
    /// No peer is configured.
    NoPeer,
    /// The process is latched local-only.
    LocalOnly,
    /// Peer calls are halted by the breaker.
    Halted,
    /// The stream was pulled recently.
    OnCooldown,
    /// The peer call failed.
    Failed,
}
