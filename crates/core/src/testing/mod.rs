//! Scripted test doubles for the crate's seams.
//!
//! Mock implementations of the external service traits, shipped in the
//! library so unit tests, integration tests and downstream crates can script
//! the same behaviors without real infrastructure.

mod mock_indexer;
mod mock_peer;
mod mock_store;

pub use mock_indexer::MockIndexer;
pub use mock_peer::{MockPeer, RecordedListCall};
pub use mock_store::MockStoreBackend;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::repository::{FileInfo, TorrentInfoRecord};

    /// A torrent record with reasonable defaults.
    pub fn torrent_record(hash: &str, title: &str, indexer: &str) -> TorrentInfoRecord {
        TorrentInfoRecord {
            hash: hash.to_string(),
            title: title.to_string(),
            size: 1024 * 1024 * 700,
            indexer: indexer.to_string(),
            category: Some("Movies".to_string()),
            files: vec![FileInfo {
                index: 0,
                path: format!("/{}/{}.mkv", title, title),
                name: format!("{}.mkv", title),
                size: 1024 * 1024 * 700,
                source: indexer.to_string(),
            }],
            seeders: Some(50),
            leechers: Some(10),
            private: false,
        }
    }

    /// A synthetic but well-formed info-hash, distinct per seed.
    pub fn info_hash(seed: u8) -> String {
        format!("{:02x}", seed).repeat(20)
    }
}
