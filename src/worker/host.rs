//! Worker event loop
//!
//! The host owns a controller and processes lifecycle events from a queue
//! on a single task. At most one install runs at a time and activation only
//! follows a finished commit. The running install is polled alongside the
//! in-flight fetches, so requests keep being answered while it works.

use crate::error::{AssetCacheError, AssetCacheResult};
use crate::worker::controller::{CacheController, FetchOutcome, InstallReport};
use crate::worker::fetch::Request;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Pending events the queue holds before dispatch waits
const QUEUE_DEPTH: usize = 64;

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawned, no install attempted
    Parsed,
    Installing,
    Installed,
    Activating,
    /// Serving fetches from the cache
    Activated,
    /// Install failed; fetches go straight to the network
    Redundant,
}

impl WorkerState {
    /// Whether fetches are answered from the cache
    pub fn is_controlling(&self) -> bool {
        matches!(self, Self::Activated)
    }

    /// Whether the worker has finished its lifecycle transitions
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Activated | Self::Redundant)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed => write!(f, "parsed"),
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}

/// Events delivered to the worker
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Install,
    Fetch(Request),
}

/// Result of handling an event
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed(InstallReport),
    Responded(FetchOutcome),
}

type Reply = oneshot::Sender<AssetCacheResult<EventOutcome>>;

struct Envelope {
    event: LifecycleEvent,
    reply: Reply,
}

/// Handle for dispatching events to a running worker
#[derive(Clone)]
pub struct WorkerHandle {
    events: mpsc::Sender<Envelope>,
    state: watch::Receiver<WorkerState>,
}

impl WorkerHandle {
    /// Queue an event and wait for its result
    pub async fn dispatch(&self, event: LifecycleEvent) -> AssetCacheResult<EventOutcome> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(Envelope { event, reply })
            .await
            .map_err(|_| AssetCacheError::WorkerGone)?;
        response.await.map_err(|_| AssetCacheError::WorkerGone)?
    }

    /// Install and, on success, activate
    pub async fn install(&self) -> AssetCacheResult<InstallReport> {
        match self.dispatch(LifecycleEvent::Install).await? {
            EventOutcome::Installed(report) => Ok(report),
            EventOutcome::Responded(_) => Err(AssetCacheError::Internal(
                "install answered with a fetch response".into(),
            )),
        }
    }

    /// Route a request through the worker
    pub async fn fetch(&self, request: Request) -> AssetCacheResult<FetchOutcome> {
        match self.dispatch(LifecycleEvent::Fetch(request)).await? {
            EventOutcome::Responded(outcome) => Ok(outcome),
            EventOutcome::Installed(_) => Err(AssetCacheError::Internal(
                "fetch answered with an install report".into(),
            )),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Wait until the worker is activated or redundant
    pub async fn settled(&self) -> AssetCacheResult<WorkerState> {
        let mut state = self.state.clone();
        let settled = *state
            .wait_for(|s| s.is_settled())
            .await
            .map_err(|_| AssetCacheError::WorkerGone)?;
        Ok(settled)
    }
}

/// Runs a controller on its own task
pub struct WorkerHost {
    controller: CacheController,
    events: mpsc::Receiver<Envelope>,
    state: watch::Sender<WorkerState>,
    last_install: Option<InstallReport>,
}

impl WorkerHost {
    /// Spawn a fresh worker in the `Parsed` state
    pub fn spawn(controller: CacheController) -> WorkerHandle {
        Self::spawn_in(controller, WorkerState::Parsed, None)
    }

    /// Spawn a worker whose store was installed by an earlier run
    pub fn resume(controller: CacheController, report: InstallReport) -> WorkerHandle {
        Self::spawn_in(controller, WorkerState::Activated, Some(report))
    }

    fn spawn_in(
        controller: CacheController,
        initial: WorkerState,
        last_install: Option<InstallReport>,
    ) -> WorkerHandle {
        let (events_tx, events_rx) = mpsc::channel(QUEUE_DEPTH);
        let (state_tx, state_rx) = watch::channel(initial);

        let host = Self {
            controller,
            events: events_rx,
            state: state_tx,
            last_install,
        };
        tokio::spawn(host.run());

        WorkerHandle {
            events: events_tx,
            state: state_rx,
        }
    }

    async fn run(self) {
        let Self {
            controller,
            mut events,
            state,
            mut last_install,
        } = self;
        let controller = &controller;
        let state = &state;
        let mut inflight = FuturesUnordered::new();
        let mut installing: Option<(BoxFuture<'_, AssetCacheResult<InstallReport>>, Reply)> =
            None;
        let mut waiting: VecDeque<Reply> = VecDeque::new();

        debug!("Worker for {} started", controller.store_name());

        loop {
            tokio::select! {
                _ = inflight.next(), if !inflight.is_empty() => {}
                result = async {
                    match installing.as_mut() {
                        Some((pending, _)) => pending.await,
                        None => std::future::pending().await,
                    }
                }, if installing.is_some() => {
                    if let Some((_, reply)) = installing.take() {
                        if let Ok(ref report) = result {
                            last_install = Some(report.clone());
                        }
                        let _ = reply.send(result.map(EventOutcome::Installed));
                    }
                    if let Some(reply) = waiting.pop_front() {
                        let pending = install(controller, state, last_install.clone()).boxed();
                        installing = Some((pending, reply));
                    }
                }
                envelope = events.recv() => {
                    let Some(Envelope { event, reply }) = envelope else {
                        break;
                    };
                    match event {
                        LifecycleEvent::Install if installing.is_some() => {
                            debug!("Install already running, queueing");
                            waiting.push_back(reply);
                        }
                        LifecycleEvent::Install => {
                            let pending = install(controller, state, last_install.clone()).boxed();
                            installing = Some((pending, reply));
                        }
                        LifecycleEvent::Fetch(request) => {
                            let controlling = state.borrow().is_controlling();
                            inflight.push(async move {
                                let result = if controlling {
                                    controller.fetch(&request).await
                                } else {
                                    controller.bypass(&request).await
                                };
                                let _ = reply.send(result.map(EventOutcome::Responded));
                            });
                        }
                    }
                }
            }
        }

        if let Some((pending, reply)) = installing.take() {
            let _ = reply.send(pending.await.map(EventOutcome::Installed));
        }
        while inflight.next().await.is_some() {}
        debug!("Worker for {} stopped", controller.store_name());
    }
}

/// Install then activate, publishing each transition.
///
/// An activated worker does not install again; it returns the report of
/// the install that activated it.
async fn install(
    controller: &CacheController,
    state: &watch::Sender<WorkerState>,
    last_install: Option<InstallReport>,
) -> AssetCacheResult<InstallReport> {
    if state.borrow().is_controlling() {
        if let Some(report) = last_install {
            debug!("Already activated, skipping install");
            return Ok(report);
        }
    }

    state.send_replace(WorkerState::Installing);
    let mut report = match controller.install().await {
        Ok(report) => report,
        Err(e) => {
            warn!("Install failed: {}", e);
            state.send_replace(WorkerState::Redundant);
            return Err(e);
        }
    };
    state.send_replace(WorkerState::Installed);

    state.send_replace(WorkerState::Activating);
    match controller.activate().await {
        Ok(reclaimed) => report.reclaimed = reclaimed,
        // Stale stores only cost disk space; still take control
        Err(e) => warn!("Cleanup of old cache stores failed: {}", e),
    }
    state.send_replace(WorkerState::Activated);
    info!("Worker activated with store {}", report.store);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::controller::tests::{context, ScriptedFetcher};
    use crate::worker::controller::ResponseSource;
    use crate::worker::store::{CacheStorage, MemoryStorage};
    use std::sync::Arc;
    use std::time::Duration;

    fn fetcher() -> Arc<ScriptedFetcher> {
        Arc::new(
            ScriptedFetcher::new()
                .route("/index.css", 200, "body{}")
                .route("/index.js", 200, "main()"),
        )
    }

    #[tokio::test]
    async fn install_activates_and_serves_from_cache() {
        let storage = Arc::new(MemoryStorage::new());
        storage.open("app-cache-v0").await.unwrap();
        let fetcher = fetcher();
        let controller = CacheController::new(context(
            storage.clone(),
            fetcher.clone(),
            "v1",
            &["/index.css"],
        ));

        let handle = WorkerHost::spawn(controller);
        assert_eq!(handle.state(), WorkerState::Parsed);

        let report = handle.install().await.unwrap();
        assert_eq!(report.reclaimed, vec!["app-cache-v0"]);
        assert_eq!(handle.state(), WorkerState::Activated);

        let request =
            Request::resolve(&url::Url::parse("http://localhost:8080/").unwrap(), "/index.css")
                .unwrap();
        let outcome = handle.fetch(request).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn fetch_before_activation_bypasses_cache() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = fetcher();
        let controller = CacheController::new(context(
            storage,
            fetcher.clone(),
            "v1",
            &["/index.css"],
        ));
        let request = controller.request("/index.css").unwrap();

        let handle = WorkerHost::spawn(controller);
        let outcome = handle.fetch(request).await.unwrap();

        assert_eq!(outcome.source, ResponseSource::Bypass);
        assert_eq!(outcome.response.body, b"body{}");
    }

    #[tokio::test]
    async fn failed_install_makes_worker_redundant() {
        let storage = Arc::new(MemoryStorage::new());
        let controller = CacheController::new(context(
            storage.clone(),
            fetcher(),
            "v1",
            &["/index.css", "/b.js"],
        ));

        let handle = WorkerHost::spawn(controller);
        assert!(handle.install().await.is_err());
        assert_eq!(handle.settled().await.unwrap(), WorkerState::Redundant);
        assert!(storage.store_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_install_is_a_no_op() {
        let fetcher = fetcher();
        let controller = CacheController::new(context(
            Arc::new(MemoryStorage::new()),
            fetcher.clone(),
            "v1",
            &["/index.css", "/index.js"],
        ));

        let handle = WorkerHost::spawn(controller);
        let first = handle.install().await.unwrap();
        let calls = fetcher.call_count();
        let second = handle.install().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.call_count(), calls);
    }

    #[tokio::test]
    async fn fetches_are_answered_while_install_runs() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .route("/slow.js", 200, "slow()")
                .route("/page.js", 200, "page()")
                .slow("/slow.js", Duration::from_secs(1))
                .slow("/page.js", Duration::from_millis(10)),
        );
        let controller = CacheController::new(context(
            Arc::new(MemoryStorage::new()),
            fetcher,
            "v1",
            &["/slow.js"],
        ));
        let request = controller.request("/page.js").unwrap();

        let handle = WorkerHost::spawn(controller);
        let installer = handle.clone();
        let install = tokio::spawn(async move { installer.install().await });
        handle
            .state
            .clone()
            .wait_for(|s| *s == WorkerState::Installing)
            .await
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_millis(500), handle.fetch(request))
            .await
            .expect("fetch stalled behind install")
            .unwrap();
        assert_eq!(outcome.source, ResponseSource::Bypass);
        assert_eq!(outcome.response.body, b"page()");

        install.await.unwrap().unwrap();
        assert_eq!(handle.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn overlapping_installs_run_once() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .route("/index.css", 200, "body{}")
                .slow("/index.css", Duration::from_millis(50)),
        );
        let controller = CacheController::new(context(
            Arc::new(MemoryStorage::new()),
            fetcher.clone(),
            "v1",
            &["/index.css"],
        ));

        let handle = WorkerHost::spawn(controller);
        let (first, second) = tokio::join!(handle.install(), handle.install());

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_fetches_all_answer() {
        let controller = CacheController::new(context(
            Arc::new(MemoryStorage::new()),
            fetcher(),
            "v1",
            &["/index.css", "/index.js"],
        ));
        let requests: Vec<_> = ["/index.css", "/index.js", "/missing"]
            .iter()
            .map(|u| controller.request(u).unwrap())
            .collect();

        let handle = WorkerHost::spawn(controller);
        handle.install().await.unwrap();

        let outcomes = futures_util::future::join_all(
            requests.into_iter().map(|r| handle.fetch(r)),
        )
        .await;
        let statuses: Vec<u16> = outcomes
            .into_iter()
            .map(|o| o.unwrap().response.status)
            .collect();
        assert_eq!(statuses, vec![200, 200, 404]);
    }
}
