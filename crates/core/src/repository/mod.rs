//! Torrent metadata repository.
//!
//! Stores torrent metadata discovered through store checks, indexer searches
//! and peer pulls, keyed by info-hash and grouped under stream identifiers.
//! Resolution always reads from here, whether or not a remote pull happened.

mod sqlite;
mod types;

pub use sqlite::SqliteTorrentRepository;
pub use types::*;

/// Keyed metadata store consumed by the resolution engine.
///
/// `upsert` must be duplicate-safe: ingesting the same record twice leaves
/// exactly one logical record per hash.
pub trait TorrentRepository: Send + Sync {
    /// List records associated with a stream identifier.
    ///
    /// With `exclude_missing_size`, records whose size is still unknown are
    /// filtered out.
    fn list_by_stream_id(
        &self,
        stream_id: &str,
        exclude_missing_size: bool,
    ) -> Result<Vec<TorrentInfoRecord>, RepositoryError>;

    /// Insert or update records, optionally linking them to a stream.
    ///
    /// With `dedupe` set, an existing record is refreshed field-by-field
    /// (incoming non-empty values win); otherwise existing records are left
    /// untouched.
    fn upsert(
        &self,
        records: &[TorrentInfoRecord],
        stream_id: Option<&str>,
        dedupe: bool,
    ) -> Result<(), RepositoryError>;

    /// Fetch a single record by canonical info-hash.
    fn get(&self, hash: &str) -> Result<Option<TorrentInfoRecord>, RepositoryError>;

    /// Total number of stored records.
    fn count(&self) -> Result<u64, RepositoryError>;
}
