use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::indexer::{IndexerError, IndexerResult, SearchIndexer, SearchQuery};

/// Scripted search indexer.
pub struct MockIndexer {
    name: String,
    results: Vec<IndexerResult>,
    should_fail: bool,
    delay: Option<Duration>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockIndexer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            results: Vec::new(),
            should_fail: false,
            delay: None,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_results(mut self, results: Vec<IndexerResult>) -> Self {
        self.results = results;
        self
    }

    pub fn failing(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared view of recorded search queries.
    pub fn queries(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.queries)
    }
}

#[async_trait]
impl SearchIndexer for MockIndexer {
    fn identify(&self) -> String {
        format!("mock/{}", self.name)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<IndexerResult>, IndexerError> {
        self.queries.lock().unwrap().push(query.query.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(IndexerError::ApiError("scripted failure".to_string()));
        }
        Ok(self.results.clone())
    }
}
