//! Incremental rebuilds while serving.
//!
//! File watcher callbacks offer [`BuildRequest`]s into a queue that holds at
//! most one pending request. A single [`Coordinator`] task consumes them:
//!
//! ```text
//!  watcher ──offer──► [ 1 slot ] ──► coordinator
//!                        │              │  wait settle delay
//!   (slot full: event    │              │  drain requests that piled up
//!    coalesced, dropped) │              │  rebuild (blocking pool), await it
//!                        ▼              ▼  loop
//! ```
//!
//! Offers never block. A burst of changes produces one rebuild, and changes
//! that arrive while a rebuild is running produce exactly one more. Rebuilds
//! never overlap, and a failed rebuild is logged without stopping the loop.

use crate::config::{ConfigError, SiteLayout};
use crate::execute::{self, ExecuteError, ExecutionSummary};
use crate::planner::{self, PlanError, PlanOptions};
use crate::render::{HandlebarsRenderer, PulldownConverter, RenderError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
    Renamed,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub requested_at: SystemTime,
    pub event: ChangeEvent,
}

/// Outcome of offering a change to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// A rebuild is already pending; this change folds into it.
    Coalesced,
    /// The coordinator has stopped.
    Closed,
}

/// Create the capacity-1 request queue.
pub fn request_queue() -> (RequestSender, RequestQueue) {
    let (tx, rx) = mpsc::channel(1);
    (RequestSender { tx }, RequestQueue { rx })
}

/// Producer side, cheap to clone into watcher callbacks.
#[derive(Debug, Clone)]
pub struct RequestSender {
    tx: mpsc::Sender<BuildRequest>,
}

impl RequestSender {
    /// Non-blocking offer. Safe to call from any thread.
    pub fn offer(&self, event: ChangeEvent) -> Offer {
        let request = BuildRequest {
            requested_at: SystemTime::now(),
            event,
        };
        match self.tx.try_send(request) {
            Ok(()) => Offer::Queued,
            Err(TrySendError::Full(dropped)) => {
                trace!(path = %dropped.event.path.display(), "rebuild already pending");
                Offer::Coalesced
            }
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }
}

#[derive(Debug)]
pub struct RequestQueue {
    rx: mpsc::Receiver<BuildRequest>,
}

#[derive(Error, Debug)]
pub enum RebuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Execute(#[from] ExecuteError),
    #[error("{0} operation(s) failed")]
    Incomplete(usize),
}

/// One rebuild cycle. Runs on the blocking pool.
pub trait RebuildHandler: Send + Sync + 'static {
    fn rebuild(&self, request: &BuildRequest) -> Result<(), RebuildError>;
}

impl<F> RebuildHandler for F
where
    F: Fn(&BuildRequest) -> Result<(), RebuildError> + Send + Sync + 'static,
{
    fn rebuild(&self, request: &BuildRequest) -> Result<(), RebuildError> {
        self(request)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub rebuilds: usize,
    pub failures: usize,
    /// Requests drained during a settle delay.
    pub coalesced: usize,
}

pub struct Coordinator<H: RebuildHandler> {
    queue: RequestQueue,
    handler: Arc<H>,
    settle: Duration,
}

impl<H: RebuildHandler> Coordinator<H> {
    pub fn new(queue: RequestQueue, handler: Arc<H>, settle: Duration) -> Self {
        Self {
            queue,
            handler,
            settle,
        }
    }

    /// Consume requests until `shutdown` fires or every sender is dropped.
    ///
    /// An in-flight rebuild is allowed to finish before the loop exits.
    pub async fn run(mut self, shutdown: CancellationToken) -> CoordinatorStats {
        let mut stats = CoordinatorStats::default();
        info!(settle_ms = self.settle.as_millis() as u64, "rebuild coordinator started");

        loop {
            let first = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = self.queue.rx.recv() => match next {
                    Some(request) => request,
                    None => break,
                },
            };
            debug!(path = %first.event.path.display(), kind = ?first.event.kind, "change detected");

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settle) => {}
            }

            let mut latest = first;
            while let Ok(newer) = self.queue.rx.try_recv() {
                stats.coalesced += 1;
                latest = newer;
            }

            let handler = Arc::clone(&self.handler);
            let started = Instant::now();
            let outcome = tokio::task::spawn_blocking(move || handler.rebuild(&latest)).await;
            stats.rebuilds += 1;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(Ok(())) => info!(elapsed_ms, "rebuild complete"),
                Ok(Err(e)) => {
                    stats.failures += 1;
                    error!(elapsed_ms, error = %e, "rebuild failed");
                }
                Err(e) => {
                    stats.failures += 1;
                    error!(error = %e, "rebuild task did not complete");
                }
            }
        }

        info!(
            rebuilds = stats.rebuilds,
            failures = stats.failures,
            "rebuild coordinator stopped"
        );
        stats
    }
}

/// Full plan-and-execute cycle for one site.
///
/// Configuration and layouts are reloaded on every cycle so edits to
/// `site.json` or the theme take effect without restarting.
#[derive(Debug, Clone)]
pub struct SiteRebuilder {
    site_root: PathBuf,
    options: PlanOptions,
}

impl SiteRebuilder {
    pub fn new(site_root: impl Into<PathBuf>, options: PlanOptions) -> Self {
        Self {
            site_root: site_root.into(),
            options,
        }
    }

    pub fn build(&self) -> Result<ExecutionSummary, RebuildError> {
        let layout = SiteLayout::load(&self.site_root)?;
        let mut plan = planner::plan(&layout, &self.options)?;
        let renderer = HandlebarsRenderer::from_dir(&layout.layouts_dir)?;
        let summary = execute::execute(&mut plan, &layout, &renderer, &PulldownConverter)?;
        if !summary.is_success() {
            return Err(RebuildError::Incomplete(summary.failures.len()));
        }
        Ok(summary)
    }
}

impl RebuildHandler for SiteRebuilder {
    fn rebuild(&self, request: &BuildRequest) -> Result<(), RebuildError> {
        debug!(trigger = %request.event.path.display(), "rebuilding site");
        match self.build() {
            Ok(_) => Ok(()),
            Err(RebuildError::Plan(PlanError::Validation(errors))) => {
                for problem in &errors {
                    warn!(%problem, "site validation");
                }
                Err(RebuildError::Plan(PlanError::Validation(errors)))
            }
            Err(e) => Err(e),
        }
    }
}
