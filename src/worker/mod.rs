//! Offline cache worker
//!
//! Installs a build's precache list into a versioned cache store, reclaims
//! earlier versions on activation, and answers requests cache-first.

pub mod controller;
pub mod fetch;
pub mod host;
pub mod store;

pub use controller::{CacheController, FetchOutcome, InstallReport, ResponseSource, WorkerContext};
pub use fetch::{DirFetcher, Fetcher, HttpFetcher, Request, Response};
pub use host::{EventOutcome, LifecycleEvent, WorkerHandle, WorkerHost, WorkerState};
pub use store::{
    format_bytes, validate_store_name, CacheStorage, DiskStorage, MemoryStorage, PrecacheBatch,
    StoreInfo,
};

use crate::config::{Config, ConfigManager};
use crate::error::{AssetCacheError, AssetCacheResult};
use crate::manifest::{PrecacheManifest, PRECACHE_MANIFEST_FILE};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Absolute scope URL from the configured origin and scope path
pub fn scope_url(config: &Config) -> AssetCacheResult<Url> {
    let invalid = |url: &str, e: url::ParseError| AssetCacheError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    };

    let origin = Url::parse(&config.worker.origin).map_err(|e| invalid(&config.worker.origin, e))?;
    // A scope without a trailing slash would resolve siblings one level up
    let scope = if config.worker.scope.ends_with('/') {
        config.worker.scope.clone()
    } else {
        format!("{}/", config.worker.scope)
    };
    origin.join(&scope).map_err(|e| invalid(&scope, e))
}

/// Disk storage at the configured or default location
pub fn open_storage(config: &Config, root: &Path) -> DiskStorage {
    let dir = match config.worker.storage_dir {
        Some(ref dir) => root.join(dir),
        None => ConfigManager::caches_dir(),
    };
    DiskStorage::new(dir)
}

/// The fetcher a configuration asks for.
///
/// `offline_dir` (from the flag or config) serves from a local directory,
/// otherwise requests go to the origin over HTTP.
pub fn create_fetcher(config: &Config, root: &Path, offline_dir: Option<&Path>) -> Arc<dyn Fetcher> {
    match offline_dir.or(config.worker.offline_dir.as_deref()) {
        Some(dir) => Arc::new(DirFetcher::new(root.join(dir))),
        None => Arc::new(HttpFetcher::new(Duration::from_secs(config.worker.timeout_secs))),
    }
}

/// Build a worker context from the last build's precache manifest
pub async fn context_from_config(
    config: &Config,
    root: &Path,
    offline_dir: Option<&Path>,
) -> AssetCacheResult<WorkerContext> {
    let manifest_path = root.join(&config.build.out_dir).join(PRECACHE_MANIFEST_FILE);
    let manifest = PrecacheManifest::load(&manifest_path).await?;

    Ok(WorkerContext {
        storage: Arc::new(open_storage(config, root)),
        fetcher: create_fetcher(config, root, offline_dir),
        manifest,
        scope: scope_url(config)?,
    })
}
