pub mod cache;
pub mod checker;
pub mod config;
pub mod indexer;
pub mod magnet;
pub mod peer;
pub mod repository;
pub mod store;
pub mod sync;
pub mod testing;
pub mod usage;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
