// src/controller.rs

use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::catalog::CatalogClient;
use crate::config::CrawlerConfig;
use crate::downloader::DownloadWorker;
use crate::events::EventSink;
use crate::http::HttpTransport;
use crate::models::{CrawlRequest, CrawlSummary, ProgressEvent, RunPhase};
use crate::pool::DownloadPool;
use crate::state::RunState;
use crate::storage::{FileSink, StorageError};

pub const NO_DATA_WARNING: &str = "No data fetched, check the network or the page range";

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("a crawl is already running")]
    AlreadyRunning,
    #[error("cannot create destination directory: {0}")]
    Setup(#[from] StorageError),
    #[error("{0} download task(s) panicked")]
    WorkerPanicked(usize),
    #[error("crawl panicked: {0}")]
    Panicked(String),
    #[error("crawl task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct ControllerState {
    phase: RunPhase,
    run: Option<Arc<RunState>>,
    last_summary: Option<CrawlSummary>,
}

/// Drives crawls: one at a time, each on its own task.
#[derive(Clone)]
pub struct CrawlController {
    config: Arc<CrawlerConfig>,
    transport: Arc<dyn HttpTransport>,
    files: Arc<dyn FileSink>,
    events: Arc<dyn EventSink>,
    inner: Arc<Mutex<ControllerState>>,
}

/// Handle to a started crawl.
#[derive(Debug)]
pub struct RunHandle {
    handle: JoinHandle<CrawlSummary>,
}

impl RunHandle {
    /// Waits until the crawl has finished and cleaned up.
    pub async fn wait(self) -> Result<CrawlSummary, ControllerError> {
        Ok(self.handle.await?)
    }
}

impl CrawlController {
    pub fn new(
        config: CrawlerConfig,
        transport: Arc<dyn HttpTransport>,
        files: Arc<dyn FileSink>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            files,
            events,
            inner: Arc::new(Mutex::new(ControllerState {
                phase: RunPhase::Idle,
                run: None,
                last_summary: None,
            })),
        }
    }

    /// Starts a crawl in the background. Rejected while another one runs.
    pub async fn start(&self, request: CrawlRequest) -> Result<RunHandle, ControllerError> {
        let state = {
            let mut inner = self.inner.lock().await;
            if inner.phase == RunPhase::Running {
                return Err(ControllerError::AlreadyRunning);
            }
            let state = Arc::new(RunState::new());
            inner.phase = RunPhase::Running;
            inner.run = Some(state.clone());
            state
        };

        info!(
            start = request.start_page,
            end = request.end_page,
            destination = %request.destination.display(),
            "Controller: starting crawl"
        );
        self.events.on_run_state_change(true);
        self.events.on_status_change("Crawling...");

        let controller = self.clone();
        let handle = tokio::spawn(async move { controller.run(state, request).await });
        Ok(RunHandle { handle })
    }

    /// Asks the running crawl to stop. Downloads already in progress finish.
    /// Returns false when nothing was running.
    pub async fn stop(&self) -> bool {
        let inner = self.inner.lock().await;
        match (&inner.phase, &inner.run) {
            (RunPhase::Running, Some(state)) if state.is_running() => {
                state.cancel();
                info!("Controller: stop requested");
                self.events.on_log("Crawl stopped by user");
                true
            }
            _ => false,
        }
    }

    pub async fn phase(&self) -> RunPhase {
        self.inner.lock().await.phase.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.phase().await == RunPhase::Running
    }

    /// Progress of the current run, if any.
    pub async fn progress(&self) -> Option<ProgressEvent> {
        self.inner.lock().await.run.as_ref().map(|state| state.progress())
    }

    /// Summary of the most recently finished run.
    pub async fn last_summary(&self) -> Option<CrawlSummary> {
        self.inner.lock().await.last_summary.clone()
    }

    async fn run(self, state: Arc<RunState>, request: CrawlRequest) -> CrawlSummary {
        let request = request.normalized();
        let result = AssertUnwindSafe(self.crawl(&state, &request))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(ControllerError::Panicked(panic_message(payload))));
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Controller: crawl aborted");
                self.events.on_error(&format!("Error during crawl: {e}"));
                RunPhase::Failed(e.to_string())
            }
        };
        self.finish(state, request, outcome).await
    }

    async fn crawl(
        &self,
        state: &Arc<RunState>,
        request: &CrawlRequest,
    ) -> Result<RunPhase, ControllerError> {
        self.files.create_dir_all(&request.destination).await?;

        let catalog = CatalogClient::new(
            self.transport.clone(),
            self.config.clone(),
            self.events.clone(),
            state.token(),
        );
        let mut scan = catalog.scan_pages(request.pages()).await;
        if !state.is_running() {
            return Ok(RunPhase::Cancelled);
        }

        let total = scan.total();
        if total == 0 {
            self.events.on_warning(NO_DATA_WARNING);
            return Ok(RunPhase::Failed(NO_DATA_WARNING.to_string()));
        }

        state.set_total(total);
        self.events.on_progress(ProgressEvent::new(0, total));
        self.events
            .on_status_change(&format!("Preparing to download {total} covers"));

        let worker = Arc::new(DownloadWorker::new(
            self.transport.clone(),
            self.files.clone(),
            self.events.clone(),
            state.clone(),
            &self.config,
        ));
        let mut pool = DownloadPool::new(worker, &request.destination, self.config.pool_size());

        'pages: for page in request.pages() {
            if !state.is_running() {
                break;
            }
            self.events.on_log(&format!("Fetching page {page}..."));
            let items = if self.config.refetch_pages {
                catalog.fetch_page(page).await
            } else {
                scan.take(page)
            };

            for item in items {
                if !state.is_running() {
                    break 'pages;
                }
                if item.is_downloadable() {
                    pool.submit(item);
                } else {
                    state.record_skip();
                    self.events
                        .on_log(&format!("Skipping invalid item: {}", item.title));
                }
            }
        }

        let report = pool.drain().await;
        info!(?report, "Controller: download phase finished");
        if report.panicked > 0 {
            return Err(ControllerError::WorkerPanicked(report.panicked));
        }

        Ok(if state.is_running() {
            RunPhase::Completed
        } else {
            RunPhase::Cancelled
        })
    }

    /// Cleanup for every terminal state: back to idle, then tell the caller.
    async fn finish(
        &self,
        state: Arc<RunState>,
        request: CrawlRequest,
        outcome: RunPhase,
    ) -> CrawlSummary {
        state.cancel();
        let summary = CrawlSummary {
            outcome,
            downloaded: state.downloaded(),
            total: state.total(),
            failed: state.failed(),
            skipped: state.skipped(),
            destination: request.destination,
        };

        {
            let mut inner = self.inner.lock().await;
            inner.phase = RunPhase::Idle;
            inner.run = None;
            inner.last_summary = Some(summary.clone());
        }

        info!(outcome = ?summary.outcome, downloaded = summary.downloaded, total = summary.total, "Controller: crawl finished");
        self.events.on_run_state_change(false);
        if summary.downloaded > 0 {
            self.events.on_status_change(&format!(
                "Completed, downloaded {} covers",
                summary.downloaded
            ));
            self.events.on_log(&format!(
                "===== Crawl finished, saved to {} =====",
                summary.destination.display()
            ));
        } else {
            self.events.on_status_change("Stopped, downloaded nothing");
        }
        summary
    }
}
