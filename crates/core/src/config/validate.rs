use super::{types::Config, ConfigError};

/// Validate configuration beyond what serde can enforce:
/// - Server port is not 0
/// - Peer url parses and token is set
/// - Store API keys are set
/// - Indexer entries are structurally valid
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if let Some(peer) = &config.peer {
        if peer.token.is_empty() {
            return Err(ConfigError::ValidationError(
                "peer.token cannot be empty".to_string(),
            ));
        }
        let url = reqwest::Url::parse(&peer.url)
            .map_err(|e| ConfigError::ValidationError(format!("peer.url: {}", e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::ValidationError(format!(
                "peer.url: unsupported scheme: {}",
                url.scheme()
            )));
        }
    }

    for (i, store) in config.stores.iter().enumerate() {
        if store.api_key.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "stores[{}].api_key cannot be empty",
                i
            )));
        }
    }

    for (i, indexer) in config.indexers.iter().enumerate() {
        // Validation runs against the full endpoint form.
        let mut indexer = indexer.clone();
        indexer.decompress();
        indexer
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("indexers[{}]: {}", i, e)))?;
    }

    if config.sync.slow_call_threshold_secs == 0 || config.sync.halt_window_secs == 0 {
        return Err(ConfigError::ValidationError(
            "sync thresholds cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_str, PeerConfig, ServerConfig};
    use std::net::IpAddr;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
                peer_token: None,
            },
            ..Config::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_peer_without_token_fails() {
        let config = Config {
            peer: Some(PeerConfig {
                url: "https://peer.example.com".to_string(),
                token: String::new(),
            }),
            ..Config::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_store_without_key_fails() {
        let config = load_config_from_str(
            r#"
[[stores]]
kind = "torbox"
api_key = ""
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_accepts_compressed_indexer_url() {
        let config = load_config_from_str(
            r#"
[[indexers]]
name = "nyaa"
kind = "torznab"
url = "tz1:jackett.local:nyaa"
api_key = "k"
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_indexer() {
        let config = load_config_from_str(
            r#"
[[indexers]]
name = ""
kind = "torznab"
url = "https://jackett.local/api/v2.0/indexers/nyaa/results"
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_err());
    }
}
