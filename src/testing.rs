//! In-memory stand-ins for the network, the filesystem and the event sink.
//!
//! They let crawls run end to end in tests without touching the network.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::events::{CrawlEvent, EventSink};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::models::ProgressEvent;
use crate::storage::{FileSink, StorageError};

/// Builds a list endpoint body in the shape the catalog returns.
pub fn catalog_body(items: &[(&str, &str)]) -> Vec<u8> {
    let list: Vec<_> = items
        .iter()
        .map(|(title, cover)| serde_json::json!({ "title": title, "cover": cover }))
        .collect();
    serde_json::json!({ "code": 0, "data": { "list": list } })
        .to_string()
        .into_bytes()
}

#[derive(Debug, Clone)]
enum MockReply {
    Respond { status: u16, body: Vec<u8> },
    Fail(String),
}

/// Transport answering from a fixed URL table. Unknown URLs get a 404.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, MockReply>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<HttpRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_response(self, url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.set_response(url, status, body);
        self
    }

    pub fn with_failure(self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.into(), MockReply::Fail(message.into()));
        self
    }

    pub fn with_catalog_page(self, url: impl Into<String>, items: &[(&str, &str)]) -> Self {
        self.with_response(url, 200, catalog_body(items))
    }

    pub fn set_response(&self, url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) {
        self.routes.lock().unwrap().insert(
            url.into(),
            MockReply::Respond {
                status,
                body: body.into(),
            },
        );
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|r| r.url == url).count()
    }

    pub fn calls_with_prefix(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.starts_with(prefix))
            .count()
    }

    /// Highest number of requests that were in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        self.calls.lock().unwrap().push(request);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reply = self.routes.lock().unwrap().get(&url).cloned();
        match reply {
            Some(MockReply::Respond { status, body }) => Ok(HttpResponse { status, body }),
            Some(MockReply::Fail(message)) => Err(TransportError::Other(message)),
            None => Ok(HttpResponse {
                status: 404,
                body: Vec::new(),
            }),
        }
    }
}

/// Filesystem kept in a map.
#[derive(Debug, Default)]
pub struct MemoryFileSink {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    dirs: Mutex<Vec<PathBuf>>,
    fail_dirs: bool,
    failing_writes: HashSet<PathBuf>,
}

impl MemoryFileSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory creation always fails.
    pub fn with_failing_dirs(mut self) -> Self {
        self.fail_dirs = true;
        self
    }

    /// Writes to this exact path fail.
    pub fn with_failing_write(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing_writes.insert(path.into());
        self
    }

    pub fn file(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn created_dirs(&self) -> Vec<PathBuf> {
        self.dirs.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileSink for MemoryFileSink {
    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        if self.fail_dirs {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
            });
        }
        self.dirs.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        if self.failing_writes.contains(path) {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::Other, "disk full"),
            });
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}

/// Keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CrawlEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CrawlEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.collect(|e| match e {
            CrawlEvent::Log(m) => Some(m.clone()),
            _ => None,
        })
    }

    pub fn warnings(&self) -> Vec<String> {
        self.collect(|e| match e {
            CrawlEvent::Warning(m) => Some(m.clone()),
            _ => None,
        })
    }

    pub fn errors(&self) -> Vec<String> {
        self.collect(|e| match e {
            CrawlEvent::Error(m) => Some(m.clone()),
            _ => None,
        })
    }

    pub fn statuses(&self) -> Vec<String> {
        self.collect(|e| match e {
            CrawlEvent::Status(m) => Some(m.clone()),
            _ => None,
        })
    }

    pub fn progress(&self) -> Vec<ProgressEvent> {
        self.collect(|e| match e {
            CrawlEvent::Progress(p) => Some(*p),
            _ => None,
        })
    }

    pub fn run_states(&self) -> Vec<bool> {
        self.collect(|e| match e {
            CrawlEvent::RunState(r) => Some(*r),
            _ => None,
        })
    }

    fn collect<T>(&self, f: impl Fn(&CrawlEvent) -> Option<T>) -> Vec<T> {
        self.events.lock().unwrap().iter().filter_map(f).collect()
    }

    fn push(&self, event: CrawlEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl EventSink for RecordingSink {
    fn on_progress(&self, progress: ProgressEvent) {
        self.push(CrawlEvent::Progress(progress));
    }

    fn on_log(&self, message: &str) {
        self.push(CrawlEvent::Log(message.to_string()));
    }

    fn on_warning(&self, message: &str) {
        self.push(CrawlEvent::Warning(message.to_string()));
    }

    fn on_error(&self, message: &str) {
        self.push(CrawlEvent::Error(message.to_string()));
    }

    fn on_status_change(&self, status: &str) {
        self.push(CrawlEvent::Status(status.to_string()));
    }

    fn on_run_state_change(&self, running: bool) {
        self.push(CrawlEvent::RunState(running));
    }
}
