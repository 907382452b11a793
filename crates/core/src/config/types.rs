use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::indexer::{IndexerConfig, IndexerKind};
use crate::sync::SyncConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Upstream peer instance, when one is configured.
    #[serde(default)]
    pub peer: Option<PeerConfig>,
    /// Backend stores, checked in priority order.
    #[serde(default)]
    pub stores: Vec<StoreEntryConfig>,
    /// Search indexers used to seed torrent metadata.
    #[serde(default)]
    pub indexers: Vec<IndexerConfig>,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Token other instances must present to use the peer endpoints.
    /// Unset leaves the peer endpoints open.
    #[serde(default)]
    pub peer_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            peer_token: None,
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("magnetmux.db")
}

/// Peer instance configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PeerConfig {
    /// Base URL of the peer instance (e.g., "https://peer.example.com")
    pub url: String,
    /// Shared secret the peer expects
    pub token: String,
}

/// One configured backend store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreEntryConfig {
    pub kind: StoreKind,
    pub api_key: String,
    /// Lower values are checked first; unset falls back to declaration order
    #[serde(default)]
    pub priority: Option<u32>,
}

/// Available store backends
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Torbox,
    // Future: RealDebrid, Premiumize
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Torbox => "torbox",
        }
    }
}

/// Peer synchronization tunables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncSettings {
    /// Seconds a stream's pull stays fresh (default: 300)
    #[serde(default = "default_pull_cooldown_secs")]
    pub pull_cooldown_secs: u64,
    /// Peer calls slower than this trip the halt window (default: 25)
    #[serde(default = "default_slow_call_threshold_secs")]
    pub slow_call_threshold_secs: u64,
    /// Seconds peer calls stay halted after trouble (default: 10)
    #[serde(default = "default_halt_window_secs")]
    pub halt_window_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            pull_cooldown_secs: default_pull_cooldown_secs(),
            slow_call_threshold_secs: default_slow_call_threshold_secs(),
            halt_window_secs: default_halt_window_secs(),
        }
    }
}

impl SyncSettings {
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            pull_cooldown: Duration::from_secs(self.pull_cooldown_secs),
            slow_call_threshold: Duration::from_secs(self.slow_call_threshold_secs),
            halt_window: Duration::from_secs(self.halt_window_secs),
        }
    }
}

fn default_pull_cooldown_secs() -> u64 {
    300
}

fn default_slow_call_threshold_secs() -> u64 {
    25
}

fn default_halt_window_secs() -> u64 {
    10
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: SanitizedServerConfig,
    pub database: DatabaseConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<SanitizedPeerConfig>,
    pub stores: Vec<SanitizedStoreConfig>,
    pub indexers: Vec<SanitizedIndexerConfig>,
    pub sync: SyncSettings,
}

/// Sanitized server config (peer token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub peer_token_configured: bool,
}

/// Sanitized peer config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPeerConfig {
    pub url: String,
    pub token_configured: bool,
}

/// Sanitized store config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStoreConfig {
    pub kind: String,
    pub api_key_configured: bool,
    pub priority: Option<u32>,
}

/// Sanitized indexer config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedIndexerConfig {
    pub name: String,
    pub kind: String,
    pub url: String,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: SanitizedServerConfig {
                host: config.server.host,
                port: config.server.port,
                peer_token_configured: config.server.peer_token.is_some(),
            },
            database: config.database.clone(),
            peer: config.peer.as_ref().map(|p| SanitizedPeerConfig {
                url: p.url.clone(),
                token_configured: !p.token.is_empty(),
            }),
            stores: config
                .stores
                .iter()
                .map(|s| SanitizedStoreConfig {
                    kind: s.kind.as_str().to_string(),
                    api_key_configured: !s.api_key.is_empty(),
                    priority: s.priority,
                })
                .collect(),
            indexers: config
                .indexers
                .iter()
                .map(|i| SanitizedIndexerConfig {
                    name: i.name.clone(),
                    kind: match i.kind {
                        IndexerKind::Torznab => "torznab".to_string(),
                        IndexerKind::Aggregator => "aggregator".to_string(),
                    },
                    url: i.url.clone(),
                    api_key_configured: !i.api_key.is_empty(),
                })
                .collect(),
            sync: config.sync.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "magnetmux.db");
        assert!(config.peer.is_none());
        assert!(config.stores.is_empty());
        assert_eq!(config.sync.pull_cooldown_secs, 300);
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/data/mux.db"

[peer]
url = "https://peer.example.com"
token = "shared-secret"

[[stores]]
kind = "torbox"
api_key = "tb-key"
priority = 1

[[indexers]]
name = "nyaa"
kind = "torznab"
url = "https://jackett.local/api/v2.0/indexers/nyaa/results"
api_key = "jk-key"

[sync]
pull_cooldown_secs = 120
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.peer.as_ref().unwrap().url, "https://peer.example.com");
        assert_eq!(config.stores.len(), 1);
        assert_eq!(config.stores[0].kind, StoreKind::Torbox);
        assert_eq!(config.stores[0].priority, Some(1));
        assert_eq!(config.indexers.len(), 1);
        assert_eq!(config.sync.pull_cooldown_secs, 120);
        assert_eq!(config.sync.halt_window_secs, 10); // default
    }

    #[test]
    fn test_sync_settings_to_durations() {
        let settings = SyncSettings::default();
        let sync = settings.to_sync_config();
        assert_eq!(sync.pull_cooldown, Duration::from_secs(300));
        assert_eq!(sync.slow_call_threshold, Duration::from_secs(25));
        assert_eq!(sync.halt_window, Duration::from_secs(10));
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let toml = r#"
[peer]
url = "https://peer.example.com"
token = "shared-secret"

[[stores]]
kind = "torbox"
api_key = "tb-key"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("shared-secret"));
        assert!(!json.contains("tb-key"));
        assert!(sanitized.peer.as_ref().unwrap().token_configured);
        assert!(sanitized.stores[0].api_key_configured);
    }
}
