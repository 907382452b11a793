//! Peer instance client.
//!
//! A peer is another running instance of this service, configured as an
//! upstream source of torrent metadata. The wire format is the same envelope
//! this service's own API speaks, so any instance can act as a peer for any
//! other.

mod types;

pub use types::*;

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::repository::TorrentInfoRecord;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the sync layer drives against a peer.
#[async_trait]
pub trait PeerApi: Send + Sync {
    /// List the peer's known torrents for a stream.
    async fn list_torrents(
        &self,
        params: &ListTorrentsParams<'_>,
    ) -> Result<PeerTorrents, PeerError>;

    /// Push locally known torrents up to the peer.
    async fn push_torrents(
        &self,
        stream_id: Option<&str>,
        items: &[TorrentInfoRecord],
    ) -> Result<(), PeerError>;
}

/// HTTP client for one configured peer.
pub struct PeerClient {
    client: Client,
    base_url: String,
    token: String,
    /// This instance's identity, advertised on every request.
    instance_id: String,
}

impl PeerClient {
    pub fn new(
        base_url: &str,
        token: &str,
        instance_id: &str,
    ) -> Result<Self, PeerError> {
        let url = reqwest::Url::parse(base_url)
            .map_err(|e| PeerError::InvalidConfig(format!("invalid peer url: {}", e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(PeerError::InvalidConfig(format!(
                "unsupported peer url scheme: {}",
                url.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PeerError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            instance_id: instance_id.to_string(),
        })
    }

    fn map_send_error(e: reqwest::Error) -> PeerError {
        if e.is_timeout() {
            PeerError::Timeout
        } else if e.is_connect() {
            PeerError::ConnectionFailed(e.to_string())
        } else {
            PeerError::ApiError(e.to_string())
        }
    }

    async fn check_response_status(response: &reqwest::Response) -> Result<(), PeerError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(PeerError::AuthenticationFailed(format!("HTTP {}", status)));
        }
        Ok(())
    }
}

#[async_trait]
impl PeerApi for PeerClient {
    async fn list_torrents(
        &self,
        params: &ListTorrentsParams<'_>,
    ) -> Result<PeerTorrents, PeerError> {
        debug!(stream_id = params.stream_id, local_only = params.local_only, "listing peer torrents");

        let response = self
            .client
            .get(format!("{}/v0/torrents", self.base_url))
            .query(&[
                ("sid", params.stream_id),
                ("local_only", if params.local_only { "true" } else { "false" }),
            ])
            .header(HEADER_PEER_TOKEN, &self.token)
            .header(HEADER_INSTANCE_ID, &self.instance_id)
            .header(HEADER_ORIGIN_INSTANCE_ID, params.origin_instance_id)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Self::check_response_status(&response).await?;
        let peer_instance_id = response
            .headers()
            .get(HEADER_INSTANCE_ID)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let envelope: Envelope<TorrentsPage> = response
            .json()
            .await
            .map_err(|e| PeerError::ApiError(format!("failed to parse response: {}", e)))?;
        Ok(PeerTorrents {
            page: envelope.into_data()?,
            peer_instance_id,
        })
    }

    async fn push_torrents(
        &self,
        stream_id: Option<&str>,
        items: &[TorrentInfoRecord],
    ) -> Result<(), PeerError> {
        debug!(count = items.len(), "pushing torrents to peer");

        let body = PushTorrentsBody {
            stream_id: stream_id.map(String::from),
            items: items.to_vec(),
        };
        let response = self
            .client
            .post(format!("{}/v0/torrents", self.base_url))
            .header(HEADER_PEER_TOKEN, &self.token)
            .header(HEADER_INSTANCE_ID, &self.instance_id)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Self::check_response_status(&response).await?;
        let envelope: Envelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| PeerError::ApiError(format!("failed to parse response: {}", e)))?;
        envelope.into_data().map(|_| ())
    }
}

/// Time-based breaker around peer calls.
///
/// Trips for a fixed window after a failure classification; callers check
/// `is_open` before issuing a request. The window clears lazily on read.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    open_until: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether calls are currently halted.
    pub fn is_open(&self) -> bool {
        let mut open_until = self.open_until.lock().unwrap_or_else(|e| e.into_inner());
        match *open_until {
            Some(deadline) if Instant::now() < deadline => true,
            Some(_) => {
                *open_until = None;
                false
            }
            None => false,
        }
    }

    /// Halt calls for `window` from now.
    pub fn trip(&self, window: Duration) {
        let mut open_until = self.open_until.lock().unwrap_or_else(|e| e.into_inner());
        *open_until = Some(Instant::now() + window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_rejects_invalid_url() {
        assert!(PeerClient::new("not a url", "t", "id").is_err());
        assert!(PeerClient::new("ftp://peer.local", "t", "id").is_err());
    }

    #[test]
    fn test_client_accepts_http_and_https() {
        assert!(PeerClient::new("http://peer.local:8080", "t", "id").is_ok());
        assert!(PeerClient::new("https://peer.local/", "t", "id").is_ok());
    }

    #[test]
    fn test_breaker_starts_closed() {
        let breaker = CircuitBreaker::new();
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_breaker_trips_and_recovers() {
        let breaker = CircuitBreaker::new();
        breaker.trip(Duration::from_millis(30));
        assert!(breaker.is_open());

        std::thread::sleep(Duration::from_millis(40));
        assert!(!breaker.is_open());
        // Stays closed after the lazy reset.
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_breaker_retrip_extends_window() {
        let breaker = CircuitBreaker::new();
        breaker.trip(Duration::from_millis(10));
        breaker.trip(Duration::from_millis(100));
        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.is_open());
    }
}
