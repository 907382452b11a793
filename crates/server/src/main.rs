mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use magnetmux_core::checker::{MultiStoreChecker, StoreHandle};
use magnetmux_core::config::StoreKind;
use magnetmux_core::indexer::IndexerPool;
use magnetmux_core::peer::{PeerApi, PeerClient};
use magnetmux_core::repository::{SqliteTorrentRepository, TorrentRepository};
use magnetmux_core::store::{StoreBackend, TorboxStore};
use magnetmux_core::sync::{PeerSyncGate, RuntimeContext};
use magnetmux_core::usage::{create_usage_system, SqliteUsageStore, UsageEvent, UsageStore};
use magnetmux_core::{load_config, validate_config};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for usage event channel
const USAGE_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("MAGNETMUX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Compute config hash for usage accounting
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    // Process identity; every outbound peer request carries it
    let runtime = Arc::new(RuntimeContext::new());
    info!("Instance id: {}", runtime.instance_id());

    // Create SQLite torrent repository
    let repository: Arc<dyn TorrentRepository> = Arc::new(
        SqliteTorrentRepository::new(&config.database.path)
            .context("Failed to create torrent repository")?,
    );
    info!("Torrent repository initialized");

    // Create SQLite usage store
    let usage_store: Arc<dyn UsageStore> = Arc::new(
        SqliteUsageStore::new(&config.database.path).context("Failed to create usage store")?,
    );
    info!("Usage store initialized");

    // Create usage system and spawn the writer task
    let (usage_handle, usage_writer) = create_usage_system(usage_store, USAGE_BUFFER_SIZE);
    let writer_handle = tokio::spawn(usage_writer.run());

    usage_handle
        .emit(UsageEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;

    // Create store backends in priority order
    let mut handles = Vec::with_capacity(config.stores.len());
    for (i, entry) in config.stores.iter().enumerate() {
        let store: Arc<dyn StoreBackend> = match entry.kind {
            StoreKind::Torbox => {
                Arc::new(TorboxStore::new().context("Failed to create TorBox store")?)
            }
        };
        let priority = entry.priority.unwrap_or(i as u32);
        info!("Store configured: {} (priority {})", store.name(), priority);
        handles.push(StoreHandle::new(store, entry.api_key.clone(), priority));
    }
    if handles.is_empty() {
        info!("No stores configured; magnet checks will be unavailable");
    }
    let checker = Arc::new(MultiStoreChecker::new(handles, Some(Arc::clone(&repository))));

    // Create peer client if configured
    let peer: Option<Arc<dyn PeerApi>> = match &config.peer {
        Some(peer_config) => {
            info!("Peer configured at {}", peer_config.url);
            Some(Arc::new(
                PeerClient::new(&peer_config.url, &peer_config.token, runtime.instance_id())
                    .context("Failed to create peer client")?,
            ))
        }
        None => {
            info!("No peer configured");
            None
        }
    };

    // Create peer sync gate
    let gate = Arc::new(PeerSyncGate::new(
        peer,
        Arc::clone(&repository),
        Arc::clone(&runtime),
        Some(usage_handle.clone()),
        config.sync.to_sync_config(),
    ));

    // Resolve indexer clients up front so config errors surface at startup
    let indexers = IndexerPool::new()
        .resolve(&config.indexers)
        .context("Failed to create indexer clients")?;
    info!("{} indexer(s) configured", indexers.len());

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        runtime,
        repository,
        checker,
        gate,
        indexers,
        usage_handle.clone(),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Emit ServiceStopped event, then drop every handle so the writer's
    // channel closes and it can drain.
    info!("Server shutting down...");
    usage_handle
        .emit(UsageEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;
    drop(usage_handle);

    let _ = writer_handle.await;
    info!("Usage writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
