use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::store::{
    CheckStatusParams, CheckedMagnet, MagnetStatus, StoreBackend, StoreError, StoreFile,
    StoreItem,
};

/// Scripted store backend.
///
/// Hashes not scripted come back as `Unknown`, matching real backends.
pub struct MockStoreBackend {
    name: String,
    scripted: HashMap<String, CheckedMagnet>,
    should_fail: bool,
    delay: Option<Duration>,
    /// Hash batches seen by `check_status`, in call order.
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockStoreBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scripted: HashMap::new(),
            should_fail: false,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script a hash as instantly available, with one plausible file.
    pub fn with_cached(mut self, hash: &str) -> Self {
        self.scripted.insert(
            hash.to_string(),
            CheckedMagnet {
                hash: hash.to_string(),
                status: MagnetStatus::Cached,
                name: Some(format!("Release-{}", &hash[..8.min(hash.len())])),
                size: 734_003_200,
                files: vec![StoreFile {
                    index: 0,
                    path: "/Release/Release.mkv".to_string(),
                    name: "Release.mkv".to_string(),
                    size: 734_003_200,
                }],
            },
        );
        self
    }

    /// Script an arbitrary status for a hash.
    pub fn with_status(mut self, hash: &str, status: MagnetStatus) -> Self {
        self.scripted.insert(
            hash.to_string(),
            CheckedMagnet {
                hash: hash.to_string(),
                status,
                name: None,
                size: 0,
                files: Vec::new(),
            },
        );
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

    /// Shared view of recorded `check_status` batches.
    pub fn calls(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl StoreBackend for MockStoreBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_status(
        &self,
        _api_key: &str,
        hashes: &[String],
        _params: &CheckStatusParams<'_>,
    ) -> Result<Vec<CheckedMagnet>, StoreError> {
        self.calls.lock().unwrap().push(hashes.to_vec());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(StoreError::ApiError("scripted failure".to_string()));
        }

        Ok(hashes
            .iter()
            .map(|hash| {
                self.scripted
                    .get(hash)
                    .cloned()
                    .unwrap_or_else(|| CheckedMagnet::unknown(hash.clone()))
            })
            .collect())
    }

    async fn add_item(&self, _api_key: &str, _magnet: &str) -> Result<StoreItem, StoreError> {
        Err(StoreError::Internal("not scripted".to_string()))
    }

    async fn generate_link(&self, _api_key: &str, _file_link: &str) -> Result<String, StoreError> {
        Err(StoreError::Internal("not scripted".to_string()))
    }

    async fn list_items(&self, _api_key: &str) -> Result<Vec<StoreItem>, StoreError> {
        Ok(Vec::new())
    }

    async fn remove_item(&self, _api_key: &str, _item_id: &str) -> Result<(), StoreError> {
        Ok(())
    }
}
