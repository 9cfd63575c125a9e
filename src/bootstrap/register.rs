//! Worker registration
//!
//! Registration is fire-and-forget. A missing worker runtime or a rejected
//! registration leaves the page running without offline support; neither
//! is an error for the caller.

use crate::error::{AssetCacheError, AssetCacheResult};
use crate::worker::{
    CacheController, FetchOutcome, InstallReport, Request, WorkerContext, WorkerHandle,
    WorkerHost, WorkerState,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A registered worker, as seen from the page
#[derive(Debug, Clone)]
pub struct Registration {
    pub script_url: String,
    pub scope: String,
    /// State once the worker settled
    pub state: WorkerState,
    /// Report of the install that activated the worker
    pub report: Option<InstallReport>,
    /// Why install failed, when the worker is redundant
    pub install_error: Option<String>,
}

/// What happened to a registration attempt
#[derive(Debug, Clone)]
pub enum RegistrationOutcome {
    Registered(Registration),
    /// No worker runtime available
    Unsupported,
    Failed(String),
}

impl RegistrationOutcome {
    pub fn registration(&self) -> Option<&Registration> {
        match self {
            Self::Registered(registration) => Some(registration),
            _ => None,
        }
    }
}

/// A runtime workers can be registered with
#[async_trait]
pub trait WorkerContainer: Send + Sync {
    async fn register(&self, script_url: &str, scope: &str) -> AssetCacheResult<Registration>;
}

/// Register a worker if a container is available.
///
/// Never fails: problems are logged and reported in the outcome.
pub async fn register(
    container: Option<&dyn WorkerContainer>,
    script_url: &str,
    scope: &str,
) -> RegistrationOutcome {
    let Some(container) = container else {
        debug!("No worker runtime, continuing without offline support");
        return RegistrationOutcome::Unsupported;
    };

    match container.register(script_url, scope).await {
        Ok(registration) => {
            debug!(
                "Registered {} for scope {} ({})",
                script_url, scope, registration.state
            );
            RegistrationOutcome::Registered(registration)
        }
        Err(e) => {
            warn!("Worker registration failed: {}", e);
            RegistrationOutcome::Failed(e.to_string())
        }
    }
}

/// Register in the background without waiting for the result
pub fn spawn_register(
    container: Option<Arc<dyn WorkerContainer>>,
    script_url: impl Into<String>,
    scope: impl Into<String>,
) -> JoinHandle<RegistrationOutcome> {
    let script_url = script_url.into();
    let scope = scope.into();
    tokio::spawn(async move { register(container.as_deref(), &script_url, &scope).await })
}

/// In-process container running workers on the local tokio runtime
pub struct LocalWorkerContainer {
    context: WorkerContext,
    worker: Mutex<Option<WorkerHandle>>,
}

impl LocalWorkerContainer {
    pub fn new(context: WorkerContext) -> Self {
        Self {
            context,
            worker: Mutex::new(None),
        }
    }

    /// The active worker, if one is registered
    pub async fn worker(&self) -> Option<WorkerHandle> {
        self.worker.lock().await.clone()
    }

    /// Send a page request through the active worker, or straight to the
    /// network when no worker is registered
    pub async fn fetch(&self, request: Request) -> AssetCacheResult<FetchOutcome> {
        match self.worker().await {
            Some(worker) => worker.fetch(request).await,
            None => {
                CacheController::new(self.context.clone())
                    .bypass(&request)
                    .await
            }
        }
    }
}

#[async_trait]
impl WorkerContainer for LocalWorkerContainer {
    async fn register(&self, script_url: &str, scope: &str) -> AssetCacheResult<Registration> {
        let mut slot = self.worker.lock().await;

        // Re-registering an activated worker is a no-op
        if let Some(ref worker) = *slot {
            if worker.state().is_controlling() {
                let report = worker.install().await.ok();
                return Ok(Registration {
                    script_url: script_url.to_string(),
                    scope: scope.to_string(),
                    state: worker.state(),
                    report,
                    install_error: None,
                });
            }
        }

        let controller = CacheController::new(self.context.clone());
        let store = controller.store_name();
        let worker = if controller.is_installed().await? {
            info!("Resuming worker with installed store {}", store);
            let info = self.context.storage.info(&store).await?;
            let report = InstallReport {
                store,
                cached: info.as_ref().map_or(0, |i| i.entries),
                bytes: info.as_ref().map_or(0, |i| i.bytes),
                reclaimed: vec![],
            };
            WorkerHost::resume(controller, report)
        } else {
            WorkerHost::spawn(controller)
        };

        let (report, install_error) = match worker.install().await {
            Ok(report) => (Some(report), None),
            Err(AssetCacheError::WorkerGone) => return Err(AssetCacheError::WorkerGone),
            Err(e) => (None, Some(e.to_string())),
        };

        let state = worker.settled().await?;
        *slot = Some(worker);

        Ok(Registration {
            script_url: script_url.to_string(),
            scope: scope.to_string(),
            state,
            report,
            install_error,
        })
    }
}
