use std::sync::Arc;

use magnetmux_core::checker::MultiStoreChecker;
use magnetmux_core::indexer::SearchIndexer;
use magnetmux_core::repository::TorrentRepository;
use magnetmux_core::sync::{PeerSyncGate, RuntimeContext};
use magnetmux_core::usage::UsageHandle;
use magnetmux_core::{Config, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    runtime: Arc<RuntimeContext>,
    repository: Arc<dyn TorrentRepository>,
    checker: Arc<MultiStoreChecker>,
    gate: Arc<PeerSyncGate>,
    indexers: Vec<Arc<dyn SearchIndexer>>,
    usage: UsageHandle,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        runtime: Arc<RuntimeContext>,
        repository: Arc<dyn TorrentRepository>,
        checker: Arc<MultiStoreChecker>,
        gate: Arc<PeerSyncGate>,
        indexers: Vec<Arc<dyn SearchIndexer>>,
        usage: UsageHandle,
    ) -> Self {
        Self {
            config,
            runtime,
            repository,
            checker,
            gate,
            indexers,
            usage,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Token inbound peer requests must present, when one is configured.
    pub fn peer_token(&self) -> Option<&str> {
        self.config.server.peer_token.as_deref()
    }

    pub fn runtime(&self) -> &RuntimeContext {
        &self.runtime
    }

    pub fn repository(&self) -> &dyn TorrentRepository {
        self.repository.as_ref()
    }

    pub fn checker(&self) -> &MultiStoreChecker {
        &self.checker
    }

    pub fn gate(&self) -> &PeerSyncGate {
        &self.gate
    }

    pub fn indexers(&self) -> &[Arc<dyn SearchIndexer>] {
        &self.indexers
    }

    pub fn usage(&self) -> &UsageHandle {
        &self.usage
    }
}
