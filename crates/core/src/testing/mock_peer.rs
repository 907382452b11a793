use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::peer::{
    ListTorrentsParams, PeerApi, PeerError, PeerTorrents, PushTorrentsBody, TorrentsPage,
};
use crate::repository::TorrentInfoRecord;

/// One recorded `list_torrents` call.
#[derive(Debug, Clone)]
pub struct RecordedListCall {
    pub stream_id: String,
    pub local_only: bool,
    pub origin_instance_id: String,
}

/// Scripted peer.
pub struct MockPeer {
    items: Vec<TorrentInfoRecord>,
    instance_id: Option<String>,
    should_fail: bool,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<RecordedListCall>>>,
    push_calls: Arc<Mutex<Vec<PushTorrentsBody>>>,
}

impl Default for MockPeer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPeer {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            instance_id: Some("mock-peer-instance".to_string()),
            should_fail: false,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            push_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_items(mut self, items: Vec<TorrentInfoRecord>) -> Self {
        self.items = items;
        self
    }

    /// Set the instance id the peer advertises on its responses.
    pub fn with_instance_id(mut self, instance_id: &str) -> Self {
        self.instance_id = Some(instance_id.to_string());
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

    /// Shared view of recorded list calls.
    pub fn calls(&self) -> Arc<Mutex<Vec<RecordedListCall>>> {
        Arc::clone(&self.calls)
    }

    /// Shared view of recorded push bodies.
    pub fn push_calls(&self) -> Arc<Mutex<Vec<PushTorrentsBody>>> {
        Arc::clone(&self.push_calls)
    }
}

#[async_trait]
impl PeerApi for MockPeer {
    async fn list_torrents(
        &self,
        params: &ListTorrentsParams<'_>,
    ) -> Result<PeerTorrents, PeerError> {
        self.calls.lock().unwrap().push(RecordedListCall {
            stream_id: params.stream_id.to_string(),
            local_only: params.local_only,
            origin_instance_id: params.origin_instance_id.to_string(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(PeerError::ConnectionFailed("scripted failure".to_string()));
        }

        Ok(PeerTorrents {
            page: TorrentsPage {
                total: self.items.len() as u64,
                items: self.items.clone(),
            },
            peer_instance_id: self.instance_id.clone(),
        })
    }

    async fn push_torrents(
        &self,
        stream_id: Option<&str>,
        items: &[TorrentInfoRecord],
    ) -> Result<(), PeerError> {
        self.push_calls.lock().unwrap().push(PushTorrentsBody {
            stream_id: stream_id.map(String::from),
            items: items.to_vec(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(PeerError::ConnectionFailed("scripted failure".to_string()));
        }
        Ok(())
    }
}
