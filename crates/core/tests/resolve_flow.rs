//! End-to-end resolution flows over scripted backends.

use std::sync::Arc;
use std::time::Duration;

use magnetmux_core::checker::{MultiStoreChecker, StoreHandle};
use magnetmux_core::indexer::{search_all, to_records, SearchIndexer, SearchQuery};
use magnetmux_core::repository::{SqliteTorrentRepository, TorrentRepository};
use magnetmux_core::store::CheckStatusParams;
use magnetmux_core::sync::{PeerSyncGate, PullStatus, ResolveParams, RuntimeContext, SyncConfig};
use magnetmux_core::testing::{fixtures, MockIndexer, MockPeer, MockStoreBackend};

fn test_sync_config() -> SyncConfig {
    SyncConfig {
        pull_cooldown: Duration::from_millis(100),
        slow_call_threshold: Duration::from_secs(5),
        halt_window: Duration::from_millis(100),
    }
}

#[tokio::test]
async fn test_pull_then_check_then_resolve() {
    let hash_a = fixtures::info_hash(0xaa);
    let hash_b = fixtures::info_hash(0xbb);

    let repository = Arc::new(SqliteTorrentRepository::in_memory().unwrap());
    let peer = MockPeer::new().with_items(vec![
        fixtures::torrent_record(&hash_a, "Release A", "nyaa"),
        fixtures::torrent_record(&hash_b, "Release B", "rarbg"),
    ]);
    let gate = PeerSyncGate::new(
        Some(Arc::new(peer)),
        Arc::clone(&repository) as Arc<dyn TorrentRepository>,
        Arc::new(RuntimeContext::new()),
        None,
        test_sync_config(),
    );

    // First resolution pulls from the peer and lands both records locally.
    let records = gate
        .resolve_stream_torrents(&ResolveParams {
            stream_id: "tt0000001",
            local_only: false,
            origin_instance_id: None,
            exclude_missing_size: false,
        })
        .await
        .unwrap();
    assert_eq!(records.len(), 2);

    // The store only has one of them cached.
    let store = MockStoreBackend::new("torbox").with_cached(&hash_a);
    let checker = MultiStoreChecker::new(
        vec![StoreHandle::new(Arc::new(store), "key", 0)],
        Some(Arc::clone(&repository) as Arc<dyn TorrentRepository>),
    );
    let hashes: Vec<String> = records.iter().map(|r| r.hash.clone()).collect();
    let outcome = checker
        .check(&hashes, &CheckStatusParams::default())
        .await
        .unwrap();

    let cached: Vec<_> = outcome.results.iter().filter(|r| r.is_cached()).collect();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].hash, hash_a);

    // A repeat resolution inside the cooldown answers from the repository.
    let records = gate
        .resolve_stream_torrents(&ResolveParams {
            stream_id: "tt0000001",
            local_only: false,
            origin_instance_id: None,
            exclude_missing_size: false,
        })
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_indexer_results_feed_resolution() {
    let hash = fixtures::info_hash(0xcc);
    let repository = Arc::new(SqliteTorrentRepository::in_memory().unwrap());

    let mut result = fixtures::torrent_record(&hash, "Indexed Release", "nyaa");
    result.files.clear();
    let indexer: Arc<dyn SearchIndexer> = Arc::new(MockIndexer::new("nyaa").with_results(vec![
        magnetmux_core::indexer::IndexerResult {
            title: result.title.clone(),
            info_hash: Some(hash.clone()),
            size: result.size,
            seeders: 10,
            leechers: 2,
            indexer: "nyaa".to_string(),
            category: None,
            download_url: None,
            private: false,
        },
    ]));

    let outcome = search_all(&[indexer], &SearchQuery::new("indexed release")).await;
    assert_eq!(outcome.results.len(), 1);

    repository
        .upsert(&to_records(&outcome.results), Some("tt0000002"), true)
        .unwrap();

    let gate = PeerSyncGate::new(
        None,
        Arc::clone(&repository) as Arc<dyn TorrentRepository>,
        Arc::new(RuntimeContext::new()),
        None,
        test_sync_config(),
    );
    let records = gate
        .resolve_stream_torrents(&ResolveParams {
            stream_id: "tt0000002",
            local_only: false,
            origin_instance_id: None,
            exclude_missing_size: false,
        })
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].hash, hash);
    assert_eq!(records[0].indexer, "nyaa");
}

#[tokio::test]
async fn test_peer_outage_degrades_but_never_fails() {
    let hash = fixtures::info_hash(0xdd);
    let repository = Arc::new(SqliteTorrentRepository::in_memory().unwrap());
    repository
        .upsert(
            &[fixtures::torrent_record(&hash, "Local Release", "nyaa")],
            Some("tt0000003"),
            true,
        )
        .unwrap();

    let gate = PeerSyncGate::new(
        Some(Arc::new(MockPeer::new().failing())),
        Arc::clone(&repository) as Arc<dyn TorrentRepository>,
        Arc::new(RuntimeContext::new()),
        None,
        test_sync_config(),
    );

    assert_eq!(gate.pull_stream("tt0000003", None).await, PullStatus::Failed);
    let records = gate
        .resolve_stream_torrents(&ResolveParams {
            stream_id: "tt0000003",
            local_only: false,
            origin_instance_id: None,
            exclude_missing_size: false,
        })
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_exclude_missing_size_filters_bare_records() {
    let hash_known = fixtures::info_hash(0xee);
    let hash_bare = fixtures::info_hash(0xef);

    let repository = Arc::new(SqliteTorrentRepository::in_memory().unwrap());
    let mut bare = fixtures::torrent_record(&hash_bare, "Bare", "nyaa");
    bare.size = 0;
    bare.files.clear();
    repository
        .upsert(
            &[fixtures::torrent_record(&hash_known, "Known", "nyaa"), bare],
            Some("tt0000004"),
            true,
        )
        .unwrap();

    let gate = PeerSyncGate::new(
        None,
        Arc::clone(&repository) as Arc<dyn TorrentRepository>,
        Arc::new(RuntimeContext::new()),
        None,
        test_sync_config(),
    );

    let all = gate
        .resolve_stream_torrents(&ResolveParams {
            stream_id: "tt0000004",
            local_only: true,
            origin_instance_id: None,
            exclude_missing_size: false,
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let sized = gate
        .resolve_stream_torrents(&ResolveParams {
            stream_id: "tt0000004",
            local_only: true,
            origin_instance_id: None,
            exclude_missing_size: true,
        })
        .await
        .unwrap();
    assert_eq!(sized.len(), 1);
    assert_eq!(sized[0].hash, hash_known);
}
