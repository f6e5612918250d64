use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CrawlerConfig;
use crate::events::EventSink;
use crate::http::{HttpRequest, HttpTransport, TransportError};
use crate::models::CatalogItem;
use crate::sanitize::sanitize;
use crate::state::RunState;
use crate::storage::{FileSink, StorageError};

/// Custom errors for download operations.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("network error: {0}")]
    Transport(#[from] TransportError),
    #[error("io error: {0}")]
    Storage(#[from] StorageError),
    #[error("status code {0}")]
    Status(u16),
}

/// Result of one download attempt.
#[derive(Debug)]
pub enum DownloadOutcome {
    Downloaded(PathBuf),
    Failed(DownloadError),
    /// The run was stopped before the attempt started.
    Aborted,
}

/// Path a cover is saved under: `<destination>/<sanitized title>.jpg`.
pub fn cover_path(destination: &Path, title: &str) -> PathBuf {
    destination.join(format!("{}.jpg", sanitize(title)))
}

/// Downloads single covers for one run.
pub struct DownloadWorker {
    transport: Arc<dyn HttpTransport>,
    files: Arc<dyn FileSink>,
    events: Arc<dyn EventSink>,
    state: Arc<RunState>,
    user_agent: String,
    timeout: Duration,
}

impl DownloadWorker {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        files: Arc<dyn FileSink>,
        events: Arc<dyn EventSink>,
        state: Arc<RunState>,
        config: &CrawlerConfig,
    ) -> Self {
        Self {
            transport,
            files,
            events,
            state,
            user_agent: config.user_agent.clone(),
            timeout: config.image_timeout,
        }
    }

    /// Downloads one cover into `destination`.
    ///
    /// Never fails outward: every error is logged through the event sink and
    /// turned into [`DownloadOutcome::Failed`]. A stopped run returns
    /// [`DownloadOutcome::Aborted`] without logging anything.
    pub async fn download_item(&self, item: &CatalogItem, destination: &Path) -> DownloadOutcome {
        if !self.state.is_running() {
            return DownloadOutcome::Aborted;
        }

        match self.fetch_and_store(item, destination).await {
            Ok(path) => {
                let progress = self.state.record_download();
                debug!(title = %item.title, path = %path.display(), "cover saved");
                self.events.on_progress(progress);
                self.events.on_status_change(&format!(
                    "Downloaded {}/{}",
                    progress.downloaded, progress.total
                ));
                self.events.on_log(&format!("Downloaded: {}.jpg", item.title));
                DownloadOutcome::Downloaded(path)
            }
            Err(DownloadError::Status(code)) => {
                self.state.record_failure();
                warn!(title = %item.title, status = code, "cover download rejected");
                self.events
                    .on_log(&format!("Download failed: {}, status {}", item.title, code));
                DownloadOutcome::Failed(DownloadError::Status(code))
            }
            Err(e) => {
                self.state.record_failure();
                warn!(title = %item.title, error = %e, "cover download failed");
                self.events
                    .on_log(&format!("Download error: {}, error: {}", item.title, e));
                DownloadOutcome::Failed(e)
            }
        }
    }

    /// Internal method to perform the single attempt.
    async fn fetch_and_store(
        &self,
        item: &CatalogItem,
        destination: &Path,
    ) -> Result<PathBuf, DownloadError> {
        let request = HttpRequest::get(item.cover_url.as_str(), self.timeout)
            .header("user-agent", self.user_agent.as_str());
        let resp = self.transport.get(request).await?;
        if resp.status != 200 {
            return Err(DownloadError::Status(resp.status));
        }

        let path = cover_path(destination, &item.title);
        self.files.write(&path, &resp.body).await?;
        Ok(path)
    }
}
