//! Types for the peer wire protocol.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::TorrentInfoRecord;

/// Authentication token header.
pub const HEADER_PEER_TOKEN: &str = "x-magnetmux-peer-token";
/// Identity of the instance answering a request.
pub const HEADER_INSTANCE_ID: &str = "x-magnetmux-instance-id";
/// Identity of the instance that originated a pull chain.
pub const HEADER_ORIGIN_INSTANCE_ID: &str = "x-magnetmux-origin-instance-id";

/// Errors that can occur when talking to a peer instance.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("Invalid peer config: {0}")]
    InvalidConfig(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON envelope every peer endpoint speaks, request and response alike
/// shaped so two instances of this service can point at each other.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<D> {
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<D>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
}

impl<D> Envelope<D> {
    pub fn ok(data: D) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(EnvelopeError {
                message: message.into(),
            }),
        }
    }

    /// Unwrap the envelope into its payload or a `PeerError`.
    pub fn into_data(self) -> Result<D, PeerError> {
        if let Some(error) = self.error {
            return Err(PeerError::ApiError(error.message));
        }
        self.data
            .ok_or_else(|| PeerError::ApiError("empty response".to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub message: String,
}

/// Parameters for listing a peer's torrents for a stream.
#[derive(Debug, Clone)]
pub struct ListTorrentsParams<'a> {
    pub stream_id: &'a str,
    /// Ask the peer to answer from its own data only, without pulling from
    /// its upstream in turn.
    pub local_only: bool,
    /// Instance that originated this pull chain.
    pub origin_instance_id: &'a str,
}

/// A peer's answer to a torrent listing request.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TorrentsPage {
    pub items: Vec<TorrentInfoRecord>,
    pub total: u64,
}

/// `TorrentsPage` plus transport-level identity of the answering peer.
#[derive(Debug, Default)]
pub struct PeerTorrents {
    pub page: TorrentsPage,
    /// The peer's advertised instance id, when it sent one.
    pub peer_instance_id: Option<String>,
}

/// Body of a torrent push to a peer.
#[derive(Debug, Serialize, Deserialize)]
pub struct PushTorrentsBody {
    pub stream_id: Option<String>,
    pub items: Vec<TorrentInfoRecord>,
}
