//! Search indexer abstraction.
//!
//! Indexers are upstream torrent search sources reached through one of two
//! variants: a direct single-endpoint client, or a gateway that fans out to
//! many indexers server-side and tags each result with its true origin. Both
//! normalize into the same result contract; everything downstream is
//! variant-agnostic.

mod aggregator;
mod torznab;
mod types;

pub use aggregator::AggregatorIndexer;
pub use torznab::TorznabIndexer;
pub use types::*;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::warn;

use crate::cache::TtlCache;
use crate::magnet::normalize_info_hash;
use crate::repository::TorrentInfoRecord;

/// How long a constructed indexer client is reused before being rebuilt.
const CLIENT_LIFETIME: Duration = Duration::from_secs(6 * 60 * 60);

/// Resolves indexer configurations into client handles, caching clients per
/// (endpoint, credential) pair so repeated requests skip reconstruction.
pub struct IndexerPool {
    clients: TtlCache<String, Arc<dyn SearchIndexer>>,
}

impl Default for IndexerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexerPool {
    pub fn new() -> Self {
        Self {
            clients: TtlCache::new("indexer:clients", CLIENT_LIFETIME),
        }
    }

    /// Resolve configurations into ready clients.
    ///
    /// Fails fast on the first structurally invalid configuration; a partial
    /// indexer list is worse than an explicit config error.
    pub fn resolve(
        &self,
        configs: &[IndexerConfig],
    ) -> Result<Vec<Arc<dyn SearchIndexer>>, IndexerError> {
        let mut indexers = Vec::with_capacity(configs.len());
        for config in configs {
            let mut config = config.clone();
            config.decompress();
            config.validate()?;

            let key = format!("{}:{}:{}", config.kind.as_str(), config.url, config.api_key);
            let client = match self.clients.get(&key) {
                Some(client) => client,
                None => {
                    let client: Arc<dyn SearchIndexer> = match config.kind {
                        IndexerKind::Torznab => Arc::new(TorznabIndexer::new(
                            &config.name,
                            &config.url,
                            &config.api_key,
                        )?),
                        IndexerKind::Aggregator => {
                            Arc::new(AggregatorIndexer::new(&config.url, &config.api_key)?)
                        }
                    };
                    self.clients.add(key, Arc::clone(&client));
                    client
                }
            };
            indexers.push(client);
        }
        Ok(indexers)
    }
}

/// Aggregated outcome of a fan-out search.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    /// Normalized results, deduplicated by info-hash (first indexer wins).
    pub results: Vec<IndexerResult>,
    /// Per-indexer failures (identity -> error message).
    pub errors: HashMap<String, String>,
}

/// Search every indexer concurrently and merge the normalized results.
///
/// A failing indexer degrades the outcome, never aborts it. Results without
/// a usable info-hash are dropped.
pub async fn search_all(
    indexers: &[Arc<dyn SearchIndexer>],
    query: &SearchQuery,
) -> SearchOutcome {
    let futures: Vec<_> = indexers
        .iter()
        .map(|indexer| {
            let indexer = Arc::clone(indexer);
            let query = query.clone();
            async move {
                let result = indexer.search(&query).await;
                (indexer.identify(), result)
            }
        })
        .collect();

    let mut outcome = SearchOutcome::default();
    let mut seen = std::collections::HashSet::new();

    for (identity, result) in join_all(futures).await {
        match result {
            Ok(results) => {
                for mut item in results {
                    let Some(hash) = item
                        .info_hash
                        .as_deref()
                        .and_then(normalize_info_hash)
                    else {
                        continue;
                    };
                    if !seen.insert(hash.clone()) {
                        continue;
                    }
                    item.info_hash = Some(hash);
                    outcome.results.push(item);
                }
            }
            Err(e) => {
                warn!(indexer = %identity, error = %e, "indexer search failed");
                outcome.errors.insert(identity, e.to_string());
            }
        }
    }

    outcome
}

/// Convert normalized results into repository insert records.
pub fn to_records(results: &[IndexerResult]) -> Vec<TorrentInfoRecord> {
    results
        .iter()
        .filter_map(|r| {
            let hash = r.info_hash.clone()?;
            Some(TorrentInfoRecord {
                hash,
                title: r.title.clone(),
                size: r.size,
                indexer: r.indexer.clone(),
                category: r.category.clone(),
                files: Vec::new(),
                seeders: Some(r.seeders),
                leechers: Some(r.leechers),
                private: r.private,
            })
        })
        .collect()
}
