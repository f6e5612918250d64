//! Upward notifications from a crawl to whoever drives it.

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};

use crate::models::ProgressEvent;

/// Receives everything a crawl reports. Called from the controller task and
/// from download workers concurrently, so implementations must be thread-safe.
pub trait EventSink: Send + Sync {
    fn on_progress(&self, progress: ProgressEvent);
    fn on_log(&self, message: &str);
    /// A blocking, user-facing warning (e.g. nothing to download).
    fn on_warning(&self, message: &str);
    /// A run-level failure.
    fn on_error(&self, message: &str);
    fn on_status_change(&self, status: &str);
    fn on_run_state_change(&self, running: bool);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum CrawlEvent {
    Progress(ProgressEvent),
    Log(String),
    Warning(String),
    Error(String),
    Status(String),
    RunState(bool),
}

/// Forwards events into an unbounded channel. Events sent after the
/// receiver is gone are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<CrawlEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<CrawlEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: CrawlEvent) {
        let _ = self.tx.send(event);
    }
}

impl EventSink for ChannelSink {
    fn on_progress(&self, progress: ProgressEvent) {
        self.send(CrawlEvent::Progress(progress));
    }

    fn on_log(&self, message: &str) {
        self.send(CrawlEvent::Log(message.to_string()));
    }

    fn on_warning(&self, message: &str) {
        self.send(CrawlEvent::Warning(message.to_string()));
    }

    fn on_error(&self, message: &str) {
        self.send(CrawlEvent::Error(message.to_string()));
    }

    fn on_status_change(&self, status: &str) {
        self.send(CrawlEvent::Status(status.to_string()));
    }

    fn on_run_state_change(&self, running: bool) {
        self.send(CrawlEvent::RunState(running));
    }
}

/// Writes events to the `tracing` subscriber. Handy for headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_progress(&self, progress: ProgressEvent) {
        info!(
            downloaded = progress.downloaded,
            total = progress.total,
            "progress {:.1}%",
            progress.percent
        );
    }

    fn on_log(&self, message: &str) {
        info!("{message}");
    }

    fn on_warning(&self, message: &str) {
        warn!("{message}");
    }

    fn on_error(&self, message: &str) {
        error!("{message}");
    }

    fn on_status_change(&self, status: &str) {
        info!(status, "status changed");
    }

    fn on_run_state_change(&self, running: bool) {
        info!(running, "run state changed");
    }
}
