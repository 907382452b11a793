//! TorBox store backend implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::magnet::magnet_uri;

use super::{
    CheckStatusParams, CheckedMagnet, MagnetStatus, StoreBackend, StoreError, StoreFile, StoreItem,
};

const DEFAULT_BASE_URL: &str = "https://api.torbox.app";

/// TorBox caps how many hashes one cached-check call may carry.
const CHECK_CHUNK_SIZE: usize = 100;

/// TorBox store client.
pub struct TorboxStore {
    client: Client,
    base_url: String,
}

impl TorboxStore {
    pub fn new() -> Result<Self, StoreError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn map_request_error(e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout
        } else if e.is_connect() {
            StoreError::ConnectionFailed(e.to_string())
        } else {
            StoreError::ApiError(e.to_string())
        }
    }

    async fn check_chunk(
        &self,
        api_key: &str,
        hashes: &[String],
    ) -> Result<Vec<TorboxCachedTorrent>, StoreError> {
        let url = format!(
            "{}/v1/api/torrents/checkcached?hash={}&format=list&list_files=true",
            self.base_url,
            urlencoding::encode(&hashes.join(","))
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(StoreError::AuthenticationFailed(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let envelope: TorboxResponse<Option<Vec<TorboxCachedTorrent>>> = response
            .json()
            .await
            .map_err(|e| StoreError::ApiError(format!("failed to parse response: {}", e)))?;
        envelope.into_data().map(Option::unwrap_or_default)
    }
}

#[async_trait]
impl StoreBackend for TorboxStore {
    fn name(&self) -> &str {
        "torbox"
    }

    async fn check_status(
        &self,
        api_key: &str,
        hashes: &[String],
        params: &CheckStatusParams<'_>,
    ) -> Result<Vec<CheckedMagnet>, StoreError> {
        debug!(
            store = self.name(),
            hashes = hashes.len(),
            stream_id = params.stream_id,
            "checking cached torrents"
        );

        let chunk_futures: Vec<_> = hashes
            .chunks(CHECK_CHUNK_SIZE)
            .map(|chunk| self.check_chunk(api_key, chunk))
            .collect();
        let chunk_results = join_all(chunk_futures).await;

        let mut cached = std::collections::HashMap::new();
        for result in chunk_results {
            for torrent in result? {
                cached.insert(torrent.hash.to_lowercase(), torrent);
            }
        }

        // One entry per input hash: absent hashes report Unknown.
        Ok(hashes
            .iter()
            .map(|hash| match cached.remove(hash) {
                Some(torrent) => CheckedMagnet {
                    hash: hash.clone(),
                    status: MagnetStatus::Cached,
                    name: Some(torrent.name),
                    size: torrent.size,
                    files: torrent
                        .files
                        .into_iter()
                        .enumerate()
                        .map(|(index, f)| StoreFile {
                            index: index as u32,
                            name: file_name(&f.name).to_string(),
                            path: f.name,
                            size: f.size,
                        })
                        .collect(),
                },
                None => CheckedMagnet::unknown(hash.clone()),
            })
            .collect())
    }

    async fn add_item(&self, api_key: &str, magnet: &str) -> Result<StoreItem, StoreError> {
        let hash = crate::magnet::normalize_info_hash(magnet)
            .ok_or_else(|| StoreError::InvalidMagnet(magnet.to_string()))?;
        let url = format!("{}/v1/api/torrents/createtorrent", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .form(&[("magnet", magnet_uri(&hash).as_str())])
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let envelope: TorboxResponse<TorboxCreatedTorrent> = response
            .json()
            .await
            .map_err(|e| StoreError::ApiError(format!("failed to parse response: {}", e)))?;
        let created = envelope.into_data()?;

        Ok(StoreItem {
            id: created.torrent_id.to_string(),
            hash,
            name: created.name.unwrap_or_default(),
            status: MagnetStatus::Queued,
            size: 0,
        })
    }

    async fn generate_link(&self, api_key: &str, file_link: &str) -> Result<String, StoreError> {
        let url = format!(
            "{}/v1/api/torrents/requestdl?token={}&{}",
            self.base_url,
            urlencoding::encode(api_key),
            file_link
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let envelope: TorboxResponse<String> = response
            .json()
            .await
            .map_err(|e| StoreError::ApiError(format!("failed to parse response: {}", e)))?;
        envelope.into_data()
    }

    async fn list_items(&self, api_key: &str) -> Result<Vec<StoreItem>, StoreError> {
        let url = format!("{}/v1/api/torrents/mylist", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let envelope: TorboxResponse<Option<Vec<TorboxTorrent>>> = response
            .json()
            .await
            .map_err(|e| StoreError::ApiError(format!("failed to parse response: {}", e)))?;

        Ok(envelope
            .into_data()?
            .unwrap_or_default()
            .into_iter()
            .map(|t| {
                let status = if t.download_finished {
                    MagnetStatus::Downloaded
                } else if t.download_state.as_deref() == Some("downloading") {
                    MagnetStatus::Downloading
                } else {
                    MagnetStatus::Queued
                };
                StoreItem {
                    id: t.id.to_string(),
                    hash: t.hash.to_lowercase(),
                    name: t.name,
                    status,
                    size: t.size,
                }
            })
            .collect())
    }

    async fn remove_item(&self, api_key: &str, item_id: &str) -> Result<(), StoreError> {
        let url = format!("{}/v1/api/torrents/controltorrent", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&serde_json::json!({
                "torrent_id": item_id,
                "operation": "delete",
            }))
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let envelope: TorboxResponse<Option<serde_json::Value>> = response
            .json()
            .await
            .map_err(|e| StoreError::ApiError(format!("failed to parse response: {}", e)))?;
        envelope.into_data().map(|_| ())
    }
}

/// Last path segment of a file path inside a torrent.
fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[derive(Debug, Deserialize)]
struct TorboxResponse<D> {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    data: D,
}

impl<D> TorboxResponse<D> {
    fn into_data(self) -> Result<D, StoreError> {
        if self.success {
            Ok(self.data)
        } else {
            let message = self
                .error
                .or(self.detail)
                .unwrap_or_else(|| "unknown upstream error".to_string());
            Err(StoreError::ApiError(message))
        }
    }
}

#[derive(Debug, Deserialize)]
struct TorboxCachedTorrent {
    hash: String,
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    files: Vec<TorboxCachedFile>,
}

#[derive(Debug, Deserialize)]
struct TorboxCachedFile {
    name: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct TorboxCreatedTorrent {
    torrent_id: u64,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TorboxTorrent {
    id: u64,
    hash: String,
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    download_finished: bool,
    #[serde(default)]
    download_state: Option<String>,
}
