//! Multi-store cache status resolution.
//!
//! Fans a batch of info-hashes out across every configured store and merges
//! the answers into one verdict per hash. The highest-priority store is asked
//! first; only hashes it does not report as cached are escalated to the
//! remaining stores concurrently. Merging happens after all stores have
//! answered, walking them in priority order, so the outcome never depends on
//! response timing.

mod types;

pub use types::*;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::magnet::normalize_info_hash;
use crate::repository::{FileInfo, TorrentInfoRecord, TorrentRepository};
use crate::store::{CheckStatusParams, CheckedMagnet, MagnetStatus, StoreError};

/// How long a per-store answer is reused before the store is asked again.
const ANSWER_LIFETIME: Duration = Duration::from_secs(10 * 60);

/// Budget for the detached repository write after a check completes.
const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MultiStoreChecker {
    /// Sorted ascending by priority; index 0 is asked first.
    handles: Vec<StoreHandle>,
    answers: TtlCache<String, CheckedMagnet>,
    repository: Option<Arc<dyn TorrentRepository>>,
}

impl MultiStoreChecker {
    pub fn new(
        mut handles: Vec<StoreHandle>,
        repository: Option<Arc<dyn TorrentRepository>>,
    ) -> Self {
        handles.sort_by_key(|h| h.priority);
        Self {
            handles,
            answers: TtlCache::new("checker:answers", ANSWER_LIFETIME),
            repository,
        }
    }

    /// Resolve cache status for a batch of hashes across all stores.
    ///
    /// Inputs may be bare hex hashes or full magnet URIs; entries that parse
    /// to no usable hash come back as `Unknown`. The returned results are in
    /// input order, one per input entry.
    pub async fn check(
        &self,
        inputs: &[String],
        params: &CheckStatusParams<'_>,
    ) -> Result<CheckOutcome, CheckerError> {
        if self.handles.is_empty() {
            return Err(CheckerError::NoConfiguredStore);
        }

        // Canonicalize up front; keep the original order for the response.
        let canonical: Vec<Option<String>> = inputs
            .iter()
            .map(|input| normalize_info_hash(input))
            .collect();
        let mut hashes: Vec<String> = Vec::new();
        for hash in canonical.iter().flatten() {
            if !hashes.contains(hash) {
                hashes.push(hash.clone());
            }
        }
        if hashes.is_empty() {
            return Err(CheckerError::InvalidInput(
                "no valid info-hash in input".to_string(),
            ));
        }

        let mut outcome = CheckOutcome::default();
        let mut verdicts: HashMap<String, CacheStatusResult> = HashMap::new();

        // Ask the highest-priority store for the whole batch first.
        let primary = &self.handles[0];
        match self.query_store(primary, &hashes, params).await {
            Ok(items) => {
                for item in items {
                    verdicts.insert(item.hash.clone(), to_verdict(item, primary.store.name()));
                }
            }
            Err(e) => {
                warn!(store = primary.store.name(), error = %e, "store check failed");
                outcome
                    .store_errors
                    .insert(primary.store.name().to_string(), e.to_string());
            }
        }

        // Escalate hashes still not cached to the remaining stores, all at
        // once. join_all yields answers in handle order, which is priority
        // order, so the merge below is deterministic no matter which store
        // responded first.
        let pending: Vec<String> = hashes
            .iter()
            .filter(|h| !verdicts.get(*h).map(CacheStatusResult::is_cached).unwrap_or(false))
            .cloned()
            .collect();
        if !pending.is_empty() && self.handles.len() > 1 {
            let queries = self.handles[1..].iter().map(|handle| {
                let pending = &pending;
                async move { (handle, self.query_store(handle, pending, params).await) }
            });

            for (handle, result) in join_all(queries).await {
                let name = handle.store.name();
                match result {
                    Ok(items) => {
                        for item in items {
                            match verdicts.get(&item.hash) {
                                // A cached verdict is final.
                                Some(v) if v.is_cached() => {}
                                // A lower-priority store only improves on a
                                // known verdict by reporting cached.
                                Some(_) if item.status == MagnetStatus::Cached => {
                                    verdicts.insert(item.hash.clone(), to_verdict(item, name));
                                }
                                Some(_) => {}
                                None => {
                                    verdicts.insert(item.hash.clone(), to_verdict(item, name));
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!(store = name, error = %e, "store check failed");
                        outcome.store_errors.insert(name.to_string(), e.to_string());
                    }
                }
            }
        }

        for (input, hash) in inputs.iter().zip(canonical.iter()) {
            let result = hash
                .as_ref()
                .and_then(|h| verdicts.get(h).cloned())
                .unwrap_or_else(|| CacheStatusResult::unknown(hash.clone().unwrap_or_else(|| input.clone())));
            outcome.results.push(result);
        }

        debug!(
            hashes = hashes.len(),
            cached = outcome.results.iter().filter(|r| r.is_cached()).count(),
            errors = outcome.store_errors.len(),
            "cache status check complete"
        );

        self.report(&outcome, params.stream_id);
        Ok(outcome)
    }

    /// Query one store, going through the per-store answer cache.
    async fn query_store(
        &self,
        handle: &StoreHandle,
        hashes: &[String],
        params: &CheckStatusParams<'_>,
    ) -> Result<Vec<CheckedMagnet>, StoreError> {
        let name = handle.store.name();
        let mut found = Vec::with_capacity(hashes.len());
        let mut misses = Vec::new();
        for hash in hashes {
            match self.answers.get(&answer_key(name, hash)) {
                Some(answer) => found.push(answer),
                None => misses.push(hash.clone()),
            }
        }

        if !misses.is_empty() {
            let fresh = handle
                .store
                .check_status(&handle.api_key, &misses, params)
                .await?;
            for item in fresh {
                self.answers.add(answer_key(name, &item.hash), item.clone());
                found.push(item);
            }
        }
        Ok(found)
    }

    /// Persist cached verdicts off the request path.
    ///
    /// Metadata learned from stores feeds later local resolutions; the write
    /// is detached and bounded so a slow database never delays the caller.
    fn report(&self, outcome: &CheckOutcome, stream_id: Option<&str>) {
        let Some(repository) = &self.repository else {
            return;
        };

        let records: Vec<TorrentInfoRecord> = outcome
            .results
            .iter()
            .filter(|r| r.is_cached())
            .map(|r| {
                let source = r.store.clone().unwrap_or_default();
                TorrentInfoRecord {
                    hash: r.hash.clone(),
                    title: String::new(),
                    size: r.files.iter().map(|f| f.size).sum(),
                    indexer: source.clone(),
                    category: None,
                    files: r
                        .files
                        .iter()
                        .map(|f| FileInfo {
                            index: f.index,
                            path: f.path.clone(),
                            name: f.name.clone(),
                            size: f.size,
                            source: source.clone(),
                        })
                        .collect(),
                    seeders: None,
                    leechers: None,
                    private: false,
                }
            })
            .collect();
        if records.is_empty() {
            return;
        }

        let repository = Arc::clone(repository);
        let stream_id = stream_id.map(String::from);
        tokio::spawn(async move {
            let write = tokio::task::spawn_blocking(move || {
                repository.upsert(&records, stream_id.as_deref(), true)
            });
            match tokio::time::timeout(REPORT_TIMEOUT, write).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warn!(error = %e, "failed to record checked torrents"),
                Ok(Err(e)) => warn!(error = %e, "torrent recording task panicked"),
                Err(_) => warn!("torrent recording timed out"),
            }
        });
    }
}

fn answer_key(store: &str, hash: &str) -> String {
    format!("{}:{}", store, hash)
}

fn to_verdict(item: CheckedMagnet, store: &str) -> CacheStatusResult {
    let attributed = item.status != MagnetStatus::Unknown;
    CacheStatusResult {
        hash: item.hash,
        status: item.status,
        store: attributed.then(|| store.to_string()),
        files: item.files,
    }
}
