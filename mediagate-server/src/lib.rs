//! # MediaGate server
//!
//! HTTP front end for the MediaGate protocol. Clients negotiate a cipher
//! suite (`/api/protocols`), agree on session keys (`/api/key`), optionally
//! prove a client certificate (`/api/auth`), then list the catalog and fetch
//! media chunks (`/api/list`, `/api/download`) sealed under per-message
//! ratchet keys.

pub mod catalog;
pub mod config;
pub mod error;
pub mod routes;
pub mod service;

use std::path::PathBuf;
use std::sync::Arc;

use mediagate_protocol::{Identity, ProtocolError};
use mediagate_sessions::SessionStore;

pub use catalog::{ChunkReader, FsChunkReader, MediaCatalog, MediaItem};
pub use config::{LogFormat, ServerConfig};
pub use error::ApiError;
pub use routes::router;
pub use service::{MediaService, SuiteHeaders};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("server identity: {0}")]
    Identity(#[from] ProtocolError),
    #[error("{path}: {source}")]
    Catalog {
        path: PathBuf,
        source: catalog::CatalogError,
    },
}

pub fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mediagate_server=info,tower_http=info".into());
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
    }
}

/// Load identity and catalog from the configured paths.
pub fn build_service(config: &ServerConfig) -> Result<MediaService, StartupError> {
    let read = |path: &PathBuf| {
        std::fs::read(path).map_err(|source| StartupError::Read {
            path: path.clone(),
            source,
        })
    };

    let cert_pem = read(&config.cert_path)?;
    let key_pem = read(&config.key_path)?;
    let key_pem = String::from_utf8_lossy(&key_pem);
    let identity = Identity::from_pem(&cert_pem, &key_pem)?;
    tracing::info!(subject = identity.certificate().subject(), "loaded server identity");

    let catalog = MediaCatalog::load(&config.catalog_path).map_err(|source| StartupError::Catalog {
        path: config.catalog_path.clone(),
        source,
    })?;
    tracing::info!(items = catalog.len(), path = %config.catalog_path.display(), "loaded catalog");

    let reader: Arc<dyn ChunkReader> = Arc::new(FsChunkReader::new(&config.catalog_dir));
    Ok(MediaService::new(identity, SessionStore::new(), catalog, reader)
        .with_require_auth(config.require_auth))
}

/// Periodically drop expired sessions. Lookups expire sessions on their own;
/// this only bounds memory held by abandoned ones.
pub fn spawn_sweeper(
    service: Arc<MediaService>,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = service.sessions().purge_expired().await;
            if purged > 0 {
                tracing::info!(purged, "expired sessions removed");
            }
        }
    })
}
