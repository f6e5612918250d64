use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, trace};

use crate::downloader::{DownloadOutcome, DownloadWorker};
use crate::models::CatalogItem;

/// Tally of everything that went through the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub downloaded: usize,
    pub failed: usize,
    pub aborted: usize,
    /// Tasks that panicked instead of returning an outcome.
    pub panicked: usize,
}

impl PoolReport {
    fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Downloaded(_) => self.downloaded += 1,
            DownloadOutcome::Failed(_) => self.failed += 1,
            DownloadOutcome::Aborted => self.aborted += 1,
        }
    }
}

/// Runs download workers with at most `size` of them active at once.
///
/// Submitting never waits: each item gets its own task which queues on the
/// semaphore. Every submitted item is attempted at most once, in no
/// particular order.
pub struct DownloadPool {
    worker: Arc<DownloadWorker>,
    destination: Arc<Path>,
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<DownloadOutcome>,
    submitted: usize,
}

impl DownloadPool {
    pub fn new(worker: Arc<DownloadWorker>, destination: &Path, size: usize) -> Self {
        trace!("Starting download pool with {} slots", size.max(1));
        Self {
            worker,
            destination: Arc::from(destination),
            semaphore: Arc::new(Semaphore::new(size.max(1))),
            tasks: JoinSet::new(),
            submitted: 0,
        }
    }

    pub fn submit(&mut self, item: CatalogItem) {
        let worker = Arc::clone(&self.worker);
        let destination = Arc::clone(&self.destination);
        let semaphore = Arc::clone(&self.semaphore);

        self.submitted += 1;
        self.tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return DownloadOutcome::Aborted,
            };
            worker.download_item(&item, &destination).await
        });
    }

    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Tasks not yet collected by [`drain`](Self::drain).
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every submitted download to finish.
    pub async fn drain(mut self) -> PoolReport {
        let mut report = PoolReport::default();
        while let Some(res) = self.tasks.join_next().await {
            match res {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    error!("A download task failed: {:?}", e);
                    report.panicked += 1;
                }
            }
        }
        trace!(?report, "download pool drained");
        report
    }
}
