//! Cache controller
//!
//! Install fetches the whole precache list and stores it atomically.
//! Activate reclaims earlier generations of the store. Fetch answers from
//! the current store first and otherwise goes to the network once, without
//! writing the network response back.

use crate::error::{AssetCacheError, AssetCacheResult};
use crate::manifest::{is_stale_store, PrecacheManifest};
use crate::worker::fetch::{Fetcher, Request, Response};
use crate::worker::store::{CacheStorage, PrecacheBatch};
use futures_util::future::join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Everything a controller needs to run
#[derive(Clone)]
pub struct WorkerContext {
    pub storage: Arc<dyn CacheStorage>,
    pub fetcher: Arc<dyn Fetcher>,
    pub manifest: PrecacheManifest,
    /// Absolute scope URL relative precache entries resolve against
    pub scope: Url,
}

/// Outcome of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub store: String,
    /// Entries written
    pub cached: usize,
    /// Body bytes written
    pub bytes: u64,
    /// Stores removed when the worker activated
    pub reclaimed: Vec<String>,
}

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Current cache store
    Cache,
    /// Network, after a cache miss
    Network,
    /// Network, because the worker was not yet controlling requests
    Bypass,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Network => write!(f, "network"),
            Self::Bypass => write!(f, "bypass"),
        }
    }
}

/// A response and its source
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub response: Response,
    pub source: ResponseSource,
}

/// Install, activate and fetch handlers for one precache manifest
pub struct CacheController {
    ctx: WorkerContext,
}

impl CacheController {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    /// Store this controller installs into and serves from
    pub fn store_name(&self) -> String {
        self.ctx.manifest.store_name()
    }

    /// Whether an earlier install of the current store committed
    pub async fn is_installed(&self) -> AssetCacheResult<bool> {
        self.ctx.storage.has(&self.store_name()).await
    }

    /// Resolve a URL against the worker scope
    pub fn request(&self, url: &str) -> AssetCacheResult<Request> {
        Request::resolve(&self.ctx.scope, url)
    }

    /// Fetch every precache URL and store them in one batch.
    ///
    /// Any transport failure or non-2xx status fails the install and leaves
    /// the store as it was before the attempt.
    pub async fn install(&self) -> AssetCacheResult<InstallReport> {
        let store = self.store_name();
        let requests = self
            .ctx
            .manifest
            .urls
            .iter()
            .map(|url| self.request(url))
            .collect::<AssetCacheResult<Vec<_>>>()?;

        info!(
            "Installing {} urls into {} via {}",
            requests.len(),
            store,
            self.ctx.fetcher.name()
        );

        // The store is created by the commit itself; nothing exists before it
        let batch = self.fetch_all(&requests).await?;
        let cached = batch.len();
        let bytes = batch.bytes();
        self.ctx.storage.commit(&store, batch).await?;

        info!("Installed {} entries into {}", cached, store);
        Ok(InstallReport {
            store,
            cached,
            bytes,
            reclaimed: vec![],
        })
    }

    /// Fetch all requests concurrently; the first failure in list order
    /// is reported.
    async fn fetch_all(&self, requests: &[Request]) -> AssetCacheResult<PrecacheBatch> {
        let fetcher = &self.ctx.fetcher;
        let results = join_all(requests.iter().map(|request| fetcher.fetch(request))).await;

        let mut batch = PrecacheBatch::new();
        for (request, result) in requests.iter().zip(results) {
            let url = request.url().as_str();
            let response = result.map_err(|e| AssetCacheError::precache(url, e.to_string()))?;
            if !response.is_ok() {
                return Err(AssetCacheError::precache(
                    url,
                    format!("HTTP {}", response.status),
                ));
            }
            debug!("Fetched {} ({} bytes)", url, response.body.len());
            batch.stage(request.cache_key(), response);
        }
        Ok(batch)
    }

    /// Delete earlier generations of this cache. Returns the deleted names.
    pub async fn activate(&self) -> AssetCacheResult<Vec<String>> {
        let current = self.store_name();
        let mut deleted = Vec::new();

        for store in self.ctx.storage.store_names().await? {
            if !is_stale_store(&store, &self.ctx.manifest.cache_name, &current) {
                continue;
            }
            if self.ctx.storage.delete(&store).await? {
                info!("Deleted stale cache store {}", store);
                deleted.push(store);
            }
        }

        Ok(deleted)
    }

    /// Cache-first lookup with network fallback.
    ///
    /// A miss is forwarded exactly once and the response passed through
    /// unchanged; network errors propagate to the caller.
    pub async fn fetch(&self, request: &Request) -> AssetCacheResult<FetchOutcome> {
        let store = self.store_name();
        if let Some(response) = self.ctx.storage.lookup(&store, request.cache_key()).await? {
            debug!("Cache hit: {}", request.url());
            return Ok(FetchOutcome {
                response,
                source: ResponseSource::Cache,
            });
        }

        debug!("Cache miss: {}", request.url());
        let response = self.ctx.fetcher.fetch(request).await?;
        Ok(FetchOutcome {
            response,
            source: ResponseSource::Network,
        })
    }

    /// Forward a request without consulting the cache
    pub async fn bypass(&self, request: &Request) -> AssetCacheResult<FetchOutcome> {
        let response = self.ctx.fetcher.fetch(request).await?;
        Ok(FetchOutcome {
            response,
            source: ResponseSource::Bypass,
        })
    }
}
