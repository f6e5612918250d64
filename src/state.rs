use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

use crate::models::ProgressEvent;

/// Counters and the running flag shared by the controller and every worker of one run.
///
/// The run is active until its token is cancelled, either by a stop command
/// or by cleanup. `downloaded` only ever grows.
#[derive(Debug, Default)]
pub struct RunState {
    token: CancellationToken,
    downloaded: AtomicU64,
    total: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Clears the running flag. Work already in progress is not interrupted.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fixes the item total. Called once, before any download is submitted.
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Counts one successful download and returns the progress it produced.
    pub fn record_download(&self) -> ProgressEvent {
        let downloaded = self.downloaded.fetch_add(1, Ordering::SeqCst) + 1;
        ProgressEvent::new(downloaded, self.total())
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn progress(&self) -> ProgressEvent {
        ProgressEvent::new(self.downloaded(), self.total())
    }
}
