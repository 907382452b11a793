//! Peer synchronization gate.
//!
//! Sits between stream resolution and the configured peer. Every resolution
//! reads from the local repository; the gate decides whether a peer pull
//! happens first. Pulls are skipped when no peer is configured, when the
//! process is latched local-only after a loop detection, when the breaker
//! has halted peer calls, or when the stream was pulled recently.

mod types;

pub use types::*;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::indexer::AGGREGATOR_FALLBACK;
use crate::peer::{CircuitBreaker, ListTorrentsParams, PeerApi, PeerError};
use crate::repository::{TorrentInfoRecord, TorrentRepository};
use crate::usage::{UsageEvent, UsageHandle};

/// Parameters for one stream resolution.
#[derive(Debug, Clone)]
pub struct ResolveParams<'a> {
    pub stream_id: &'a str,
    /// Answer from local data only; no peer pull.
    pub local_only: bool,
    /// Origin instance id forwarded by the requester, when the request came
    /// from another instance.
    pub origin_instance_id: Option<&'a str>,
    /// Drop records whose size is still unknown.
    pub exclude_missing_size: bool,
}

pub struct PeerSyncGate {
    peer: Option<Arc<dyn PeerApi>>,
    repository: Arc<dyn TorrentRepository>,
    runtime: Arc<RuntimeContext>,
    breaker: CircuitBreaker,
    cooldown: CooldownTracker,
    usage: Option<UsageHandle>,
    config: SyncConfig,
}

impl PeerSyncGate {
    pub fn new(
        peer: Option<Arc<dyn PeerApi>>,
        repository: Arc<dyn TorrentRepository>,
        runtime: Arc<RuntimeContext>,
        usage: Option<UsageHandle>,
        config: SyncConfig,
    ) -> Self {
        let cooldown = CooldownTracker::new(config.pull_cooldown);
        Self {
            peer,
            repository,
            runtime,
            breaker: CircuitBreaker::new(),
            cooldown,
            usage,
            config,
        }
    }

    /// Resolve the known torrents for a stream, pulling from the peer first
    /// when the gate allows it.
    ///
    /// Peer trouble never fails resolution; the local repository always
    /// answers.
    pub async fn resolve_stream_torrents(
        &self,
        params: &ResolveParams<'_>,
    ) -> Result<Vec<TorrentInfoRecord>, SyncError> {
        if let Some(origin) = params.origin_instance_id {
            if origin == self.runtime.instance_id() {
                // Our own pull came back to us through the peer chain.
                self.runtime.enter_local_only("own origin id on incoming request");
            }
        }

        if !params.local_only {
            let status = self
                .pull_stream(params.stream_id, params.origin_instance_id)
                .await;
            debug!(stream_id = params.stream_id, ?status, "peer pull");
        }

        Ok(self
            .repository
            .list_by_stream_id(params.stream_id, params.exclude_missing_size)?)
    }

    /// Attempt a peer pull for one stream.
    pub async fn pull_stream(
        &self,
        stream_id: &str,
        origin_instance_id: Option<&str>,
    ) -> PullStatus {
        let Some(peer) = &self.peer else {
            return PullStatus::NoPeer;
        };
        if self.runtime.is_local_only() {
            return PullStatus::LocalOnly;
        }
        if self.breaker.is_open() {
            debug!(stream_id, "peer calls halted, skipping pull");
            return PullStatus::Halted;
        }
        if !self.cooldown.should_pull(stream_id) {
            self.emit_cached_telemetry(stream_id);
            return PullStatus::OnCooldown;
        }

        let origin = origin_instance_id.unwrap_or_else(|| self.runtime.instance_id());
        let started = Instant::now();
        let result = peer
            .list_torrents(&ListTorrentsParams {
                stream_id,
                local_only: false,
                origin_instance_id: origin,
            })
            .await;
        let elapsed = started.elapsed();

        let pulled = match result {
            Ok(pulled) => pulled,
            Err(e) => {
                // Only a failure that was also slow halts peer calls: a peer
                // that refuses quickly costs little to keep asking, one that
                // drags every uncooled resolution out past the threshold
                // before failing does not.
                if elapsed > self.config.slow_call_threshold {
                    warn!(
                        stream_id,
                        error = %e,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "slow peer pull failure, halting peer calls"
                    );
                    self.breaker.trip(self.config.halt_window);
                } else {
                    warn!(stream_id, error = %e, "peer pull failed");
                }
                self.emit_failure_telemetry(stream_id, elapsed.as_millis() as u64, &e);
                return PullStatus::Failed;
            }
        };

        if pulled.peer_instance_id.as_deref() == Some(self.runtime.instance_id()) {
            self.runtime.enter_local_only("peer answered with our own instance id");
            return PullStatus::LocalOnly;
        }

        let items = pulled.page.items;
        if let Err(e) = self.repository.upsert(&items, Some(stream_id), true) {
            warn!(stream_id, error = %e, "failed to ingest pulled torrents");
            return PullStatus::Failed;
        }
        self.cooldown.mark_pulled(stream_id);
        self.emit_pull_telemetry(stream_id, &items, elapsed.as_millis() as u64);

        debug!(stream_id, count = items.len(), "pulled torrents from peer");
        PullStatus::Pulled(items.len())
    }

    /// Offer locally known torrents to the peer. Best-effort; failures trip
    /// the same halt window as pulls.
    pub async fn push_stream(
        &self,
        stream_id: Option<&str>,
        items: &[TorrentInfoRecord],
    ) -> bool {
        let Some(peer) = &self.peer else {
            return false;
        };
        if items.is_empty() || self.runtime.is_local_only() || self.breaker.is_open() {
            return false;
        }

        let started = Instant::now();
        match peer.push_torrents(stream_id, items).await {
            Ok(()) => true,
            Err(e) => {
                if started.elapsed() > self.config.slow_call_threshold {
                    warn!(error = %e, "slow peer push failure, halting peer calls");
                    self.breaker.trip(self.config.halt_window);
                } else {
                    warn!(error = %e, "peer push failed");
                }
                false
            }
        }
    }

    /// On a cooldown skip the stored records still answer the request;
    /// account for them as cache hits, attributed to their origin indexers.
    fn emit_cached_telemetry(&self, stream_id: &str) {
        if self.usage.is_none() {
            return;
        }
        match self.repository.list_by_stream_id(stream_id, false) {
            Ok(records) => self.emit_grouped(stream_id, &records, 0, true),
            Err(e) => warn!(stream_id, error = %e, "failed to read records for accounting"),
        }
    }

    fn emit_pull_telemetry(&self, stream_id: &str, items: &[TorrentInfoRecord], duration_ms: u64) {
        self.emit_grouped(stream_id, items, duration_ms, false);
    }

    fn emit_failure_telemetry(&self, stream_id: &str, duration_ms: u64, error: &PeerError) {
        let Some(usage) = &self.usage else {
            return;
        };
        usage.try_emit(UsageEvent::IndexerQueryFailed {
            indexer: AGGREGATOR_FALLBACK.to_string(),
            stream_id: stream_id.to_string(),
            duration_ms,
            error_type: "peer_pull".to_string(),
            error_message: error.to_string(),
        });
    }

    fn emit_grouped(
        &self,
        stream_id: &str,
        records: &[TorrentInfoRecord],
        duration_ms: u64,
        cached: bool,
    ) {
        let Some(usage) = &self.usage else {
            return;
        };

        let mut per_indexer: HashMap<&str, u32> = HashMap::new();
        for record in records {
            let indexer = if record.indexer.is_empty() {
                AGGREGATOR_FALLBACK
            } else {
                record.indexer.as_str()
            };
            *per_indexer.entry(indexer).or_default() += 1;
        }
        // An empty answer is still an answered query; keep it visible.
        if per_indexer.is_empty() {
            per_indexer.insert(AGGREGATOR_FALLBACK, 0);
        }

        for (indexer, count) in per_indexer {
            usage.try_emit(UsageEvent::IndexerQuery {
                indexer: indexer.to_string(),
                stream_id: stream_id.to_string(),
                duration_ms,
                result_count: count,
                cached,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::repository::SqliteTorrentRepository;
    use crate::testing::MockPeer;
    use crate::usage::{create_usage_system, SqliteUsageStore, UsageFilter, UsageStore};

    const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn record(hash: &str, indexer: &str) -> TorrentInfoRecord {
        TorrentInfoRecord {
            hash: hash.to_string(),
            title: format!("Release {}", hash),
            size: 100,
            indexer: indexer.to_string(),
            category: None,
            files: Vec::new(),
            seeders: Some(1),
            leechers: Some(0),
            private: false,
        }
    }

    fn fast_config() -> SyncConfig {
        SyncConfig {
            pull_cooldown: Duration::from_millis(60),
            slow_call_threshold: Duration::from_millis(40),
            halt_window: Duration::from_millis(80),
        }
    }

    fn gate_with(
        peer: Option<Arc<dyn PeerApi>>,
        config: SyncConfig,
    ) -> (PeerSyncGate, Arc<SqliteTorrentRepository>, Arc<RuntimeContext>) {
        let repository = Arc::new(SqliteTorrentRepository::in_memory().unwrap());
        let runtime = Arc::new(RuntimeContext::new());
        let gate = PeerSyncGate::new(
            peer,
            Arc::clone(&repository) as Arc<dyn TorrentRepository>,
            Arc::clone(&runtime),
            None,
            config,
        );
        (gate, repository, runtime)
    }

    fn resolve_params(stream_id: &str) -> ResolveParams<'_> {
        ResolveParams {
            stream_id,
            local_only: false,
            origin_instance_id: None,
            exclude_missing_size: false,
        }
    }

    #[tokio::test]
    async fn test_no_peer_resolves_from_repository() {
        let (gate, repository, _) = gate_with(None, fast_config());
        repository
            .upsert(&[record(HASH_A, "nyaa")], Some("tt0000001"), true)
            .unwrap();

        let records = gate
            .resolve_stream_torrents(&resolve_params("tt0000001"))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(gate.pull_stream("tt0000001", None).await, PullStatus::NoPeer);
    }

    #[tokio::test]
    async fn test_pull_ingests_and_links_records() {
        let peer = MockPeer::new().with_items(vec![record(HASH_A, "nyaa"), record(HASH_B, "")]);
        let (gate, repository, _) = gate_with(Some(Arc::new(peer)), fast_config());

        let records = gate
            .resolve_stream_torrents(&resolve_params("tt0000001"))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(repository.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cooldown_skips_repeat_pulls() {
        let peer = MockPeer::new().with_items(vec![record(HASH_A, "nyaa")]);
        let calls = peer.calls();
        let (gate, _, _) = gate_with(Some(Arc::new(peer)), fast_config());

        assert_eq!(gate.pull_stream("tt0000001", None).await, PullStatus::Pulled(1));
        assert_eq!(gate.pull_stream("tt0000001", None).await, PullStatus::OnCooldown);
        // A different stream is not affected by the first stream's cooldown.
        assert!(matches!(
            gate.pull_stream("tt0000002", None).await,
            PullStatus::Pulled(_)
        ));
        assert_eq!(calls.lock().unwrap().len(), 2);

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(gate.pull_stream("tt0000001", None).await, PullStatus::Pulled(1));
    }

    #[tokio::test]
    async fn test_fast_failure_does_not_halt_pulls() {
        let peer = MockPeer::new().failing();
        let calls = peer.calls();
        let (gate, _, _) = gate_with(Some(Arc::new(peer)), fast_config());

        assert_eq!(gate.pull_stream("tt0000001", None).await, PullStatus::Failed);
        // An instant refusal is cheap to retry; the next stream still asks.
        assert_eq!(gate.pull_stream("tt0000002", None).await, PullStatus::Failed);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_slow_failure_halts_subsequent_pulls() {
        let peer = MockPeer::new()
            .failing()
            .with_delay(Duration::from_millis(60));
        let calls = peer.calls();
        let (gate, _, _) = gate_with(Some(Arc::new(peer)), fast_config());

        assert_eq!(gate.pull_stream("tt0000001", None).await, PullStatus::Failed);
        assert_eq!(gate.pull_stream("tt0000002", None).await, PullStatus::Halted);
        assert_eq!(calls.lock().unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(gate.pull_stream("tt0000002", None).await, PullStatus::Failed);
    }

    #[tokio::test]
    async fn test_slow_success_does_not_halt() {
        let peer = MockPeer::new()
            .with_items(vec![record(HASH_A, "nyaa")])
            .with_delay(Duration::from_millis(60));
        let (gate, repository, _) = gate_with(Some(Arc::new(peer)), fast_config());

        assert_eq!(gate.pull_stream("tt0000001", None).await, PullStatus::Pulled(1));
        assert_eq!(repository.count().unwrap(), 1);
        // A peer that answers, however slowly, stays in rotation.
        assert_eq!(gate.pull_stream("tt0000002", None).await, PullStatus::Pulled(1));
    }

    #[tokio::test]
    async fn test_incoming_origin_match_latches_local_only() {
        let peer = MockPeer::new().with_items(vec![record(HASH_A, "nyaa")]);
        let calls = peer.calls();
        let (gate, _, runtime) = gate_with(Some(Arc::new(peer)), fast_config());

        let own_id = runtime.instance_id().to_string();
        let params = ResolveParams {
            origin_instance_id: Some(&own_id),
            ..resolve_params("tt0000001")
        };
        gate.resolve_stream_torrents(&params).await.unwrap();

        assert!(runtime.is_local_only());
        assert!(calls.lock().unwrap().is_empty());

        // The latch outlives the triggering request.
        gate.resolve_stream_torrents(&resolve_params("tt0000002"))
            .await
            .unwrap();
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_peer_echoing_own_identity_latches_local_only() {
        let (gate, _, runtime) = {
            let repository = Arc::new(SqliteTorrentRepository::in_memory().unwrap());
            let runtime = Arc::new(RuntimeContext::new());
            let peer = MockPeer::new()
                .with_items(vec![record(HASH_A, "nyaa")])
                .with_instance_id(runtime.instance_id());
            let gate = PeerSyncGate::new(
                Some(Arc::new(peer)),
                repository as Arc<dyn TorrentRepository>,
                Arc::clone(&runtime),
                None,
                fast_config(),
            );
            (gate, (), runtime)
        };

        assert_eq!(
            gate.pull_stream("tt0000001", None).await,
            PullStatus::LocalOnly
        );
        assert!(runtime.is_local_only());
        assert_eq!(
            gate.pull_stream("tt0000002", None).await,
            PullStatus::LocalOnly
        );
    }

    #[tokio::test]
    async fn test_local_only_param_skips_pull_without_latching() {
        let peer = MockPeer::new().with_items(vec![record(HASH_A, "nyaa")]);
        let calls = peer.calls();
        let (gate, _, runtime) = gate_with(Some(Arc::new(peer)), fast_config());

        let params = ResolveParams {
            local_only: true,
            ..resolve_params("tt0000001")
        };
        gate.resolve_stream_torrents(&params).await.unwrap();
        assert!(calls.lock().unwrap().is_empty());
        assert!(!runtime.is_local_only());

        gate.resolve_stream_torrents(&resolve_params("tt0000001"))
            .await
            .unwrap();
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cooldown_skip_still_accounts_stored_records() {
        let usage_store = Arc::new(SqliteUsageStore::in_memory().unwrap());
        let (usage, writer) =
            create_usage_system(Arc::clone(&usage_store) as _, 16);
        let writer_task = tokio::spawn(writer.run());

        let repository = Arc::new(SqliteTorrentRepository::in_memory().unwrap());
        let peer = MockPeer::new().with_items(vec![record(HASH_A, "nyaa"), record(HASH_B, "")]);
        let gate = PeerSyncGate::new(
            Some(Arc::new(peer)),
            Arc::clone(&repository) as Arc<dyn TorrentRepository>,
            Arc::new(RuntimeContext::new()),
            Some(usage.clone()),
            fast_config(),
        );

        assert!(matches!(
            gate.pull_stream("tt0000001", None).await,
            PullStatus::Pulled(2)
        ));
        assert_eq!(
            gate.pull_stream("tt0000001", None).await,
            PullStatus::OnCooldown
        );

        drop(gate);
        drop(usage);
        writer_task.await.unwrap();

        let events = usage_store.query(&UsageFilter::new()).unwrap();
        // Two indexers from the pull, two more from the cooldown skip; the
        // unattributed record falls under the shared fallback label.
        assert_eq!(events.len(), 4);
        assert!(events
            .iter()
            .any(|e| e.indexer.as_deref() == Some(AGGREGATOR_FALLBACK)));
        let cached: Vec<_> = events
            .iter()
            .filter(|e| matches!(e.event, UsageEvent::IndexerQuery { cached: true, .. }))
            .collect();
        assert_eq!(cached.len(), 2);
    }

    #[tokio::test]
    async fn test_fast_push_failure_does_not_halt() {
        let peer = MockPeer::new().failing();
        let (gate, _, _) = gate_with(Some(Arc::new(peer)), fast_config());

        let items = vec![record(HASH_A, "nyaa")];
        assert!(!gate.push_stream(Some("tt0000001"), &items).await);
        // The push refused quickly, so the breaker stays closed.
        assert_eq!(gate.pull_stream("tt0000001", None).await, PullStatus::Failed);
    }

    #[tokio::test]
    async fn test_slow_push_failure_halts_peer_calls() {
        let peer = MockPeer::new()
            .failing()
            .with_delay(Duration::from_millis(60));
        let (gate, _, _) = gate_with(Some(Arc::new(peer)), fast_config());

        let items = vec![record(HASH_A, "nyaa")];
        assert!(!gate.push_stream(Some("tt0000001"), &items).await);
        // The slow push failure halted peer calls; pulls see the same breaker.
        assert_eq!(gate.pull_stream("tt0000001", None).await, PullStatus::Halted);
    }

    #[tokio::test]
    async fn test_pull_failure_emits_failure_event() {
        let usage_store = Arc::new(SqliteUsageStore::in_memory().unwrap());
        let (usage, writer) = create_usage_system(Arc::clone(&usage_store) as _, 16);
        let writer_task = tokio::spawn(writer.run());

        let repository = Arc::new(SqliteTorrentRepository::in_memory().unwrap());
        let gate = PeerSyncGate::new(
            Some(Arc::new(MockPeer::new().failing())),
            repository as Arc<dyn TorrentRepository>,
            Arc::new(RuntimeContext::new()),
            Some(usage.clone()),
            fast_config(),
        );

        assert_eq!(gate.pull_stream("tt0000001", None).await, PullStatus::Failed);

        drop(gate);
        drop(usage);
        writer_task.await.unwrap();

        let events = usage_store.query(&UsageFilter::new()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "indexer_query_failed");
        assert_eq!(events[0].indexer.as_deref(), Some(AGGREGATOR_FALLBACK));
        assert!(matches!(
            &events[0].event,
            UsageEvent::IndexerQueryFailed { error_type, .. } if error_type == "peer_pull"
        ));
    }

    #[tokio::test]
    async fn test_empty_pull_still_accounts_query() {
        let usage_store = Arc::new(SqliteUsageStore::in_memory().unwrap());
        let (usage, writer) = create_usage_system(Arc::clone(&usage_store) as _, 16);
        let writer_task = tokio::spawn(writer.run());

        let repository = Arc::new(SqliteTorrentRepository::in_memory().unwrap());
        let gate = PeerSyncGate::new(
            Some(Arc::new(MockPeer::new())),
            repository as Arc<dyn TorrentRepository>,
            Arc::new(RuntimeContext::new()),
            Some(usage.clone()),
            fast_config(),
        );

        assert_eq!(gate.pull_stream("tt0000001", None).await, PullStatus::Pulled(0));

        drop(gate);
        drop(usage);
        writer_task.await.unwrap();

        let events = usage_store.query(&UsageFilter::new()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].indexer.as_deref(), Some(AGGREGATOR_FALLBACK));
        assert!(matches!(
            events[0].event,
            UsageEvent::IndexerQuery { result_count: 0, cached: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_push_skips_empty_batches() {
        let peer = MockPeer::new();
        let calls = peer.push_calls();
        let (gate, _, _) = gate_with(Some(Arc::new(peer)), fast_config());

        assert!(!gate.push_stream(Some("tt0000001"), &[]).await);
        assert!(calls.lock().unwrap().is_empty());
    }
}
