pub mod catalog;
pub mod config;
pub mod controller;
pub mod downloader;
pub mod events;
pub mod http;
pub mod models;
pub mod pool;
pub mod sanitize;
pub mod state;
pub mod storage;
pub mod testing;

/// Convenient type alias exposing common structs.
pub mod prelude {
    pub use crate::catalog::{CatalogClient, CatalogScan};
    pub use crate::config::CrawlerConfig;
    pub use crate::controller::{ControllerError, CrawlController, RunHandle};
    pub use crate::downloader::{DownloadOutcome, DownloadWorker};
    pub use crate::events::{ChannelSink, CrawlEvent, EventSink, TracingSink};
    pub use crate::http::{HttpTransport, ReqwestTransport};
    pub use crate::models::{CatalogItem, CrawlRequest, CrawlSummary, ProgressEvent, RunPhase};
    pub use crate::pool::{DownloadPool, PoolReport};
    pub use crate::sanitize::sanitize;
    pub use crate::state::RunState;
    pub use crate::storage::{FileSink, LocalFileSink};
}
