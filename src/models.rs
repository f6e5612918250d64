// src/models.rs

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Parameters of a single crawl, fixed for the lifetime of the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrawlRequest {
    pub start_page: i64,
    pub end_page: i64,
    pub destination: PathBuf,
}

impl CrawlRequest {
    pub fn new(start_page: i64, end_page: i64, destination: impl Into<PathBuf>) -> Self {
        Self {
            start_page,
            end_page,
            destination: destination.into(),
        }
    }

    /// Clamps the page range: the first page is at least 1 and the last page
    /// is never before the first.
    pub fn normalized(&self) -> Self {
        let start_page = self.start_page.max(1);
        let end_page = self.end_page.max(start_page);
        Self {
            start_page,
            end_page,
            destination: self.destination.clone(),
        }
    }

    pub fn pages(&self) -> RangeInclusive<i64> {
        self.start_page..=self.end_page
    }
}

/// One entry of the catalog list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogItem {
    pub title: String,
    pub cover_url: String,
}

impl CatalogItem {
    pub fn new(title: impl Into<String>, cover_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            cover_url: cover_url.into(),
        }
    }

    /// Items without a title or a cover URL are skipped by the crawl.
    pub fn is_downloadable(&self) -> bool {
        !self.title.is_empty() && !self.cover_url.is_empty()
    }
}

/// Emitted after every successful download.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub downloaded: u64,
    pub total: u64,
    /// Percentage from 0.0 to 100.0.
    pub percent: f64,
}

impl ProgressEvent {
    pub fn new(downloaded: u64, total: u64) -> Self {
        let percent = if total == 0 {
            0.0
        } else {
            (downloaded as f64 / total as f64 * 100.0).min(100.0)
        };
        Self {
            downloaded,
            total,
            percent,
        }
    }
}

/// Lifecycle of the crawl controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    /// Every page was walked and every submitted download finished with no stop requested.
    Completed,
    /// A stop was requested before the download pool drained. This includes a
    /// stop that lands after the page loop already submitted every item.
    Cancelled,
    Failed(String),
}

/// Final report of a run, handed back once cleanup is done.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrawlSummary {
    pub outcome: RunPhase,
    pub downloaded: u64,
    pub total: u64,
    pub failed: u64,
    pub skipped: u64,
    pub destination: PathBuf,
}

impl CrawlSummary {
    pub fn progress(&self) -> ProgressEvent {
        ProgressEvent::new(self.downloaded, self.total)
    }
}
