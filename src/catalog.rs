// src/catalog.rs

use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::CrawlerConfig;
use crate::events::EventSink;
use crate::http::{HttpRequest, HttpTransport, TransportError};
use crate::models::CatalogItem;

/// Title used when a catalog entry has no `title` field at all.
pub const UNKNOWN_TITLE: &str = "Unknown title";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed body: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Extracts the items of one list response.
///
/// The list lives at `data.list`; a body without it is an empty page. Fields
/// are read best-effort: a missing title becomes [`UNKNOWN_TITLE`], a null
/// title or a missing/non-string cover becomes an empty string.
pub fn parse_catalog_page(body: &[u8]) -> Result<Vec<CatalogItem>, serde_json::Error> {
    let root: Value = serde_json::from_slice(body)?;
    let list = match root.get("data").and_then(|d| d.get("list")) {
        Some(Value::Array(list)) => list,
        _ => return Ok(Vec::new()),
    };

    Ok(list
        .iter()
        .map(|entry| {
            let title = match entry.get("title") {
                None => UNKNOWN_TITLE.to_string(),
                Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            let cover_url = entry
                .get("cover")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            CatalogItem { title, cover_url }
        })
        .collect())
}

/// Items of every page seen by the counting pass, keyed by page number.
#[derive(Debug, Clone, Default)]
pub struct CatalogScan {
    pages: BTreeMap<i64, Vec<CatalogItem>>,
}

impl CatalogScan {
    pub fn total(&self) -> u64 {
        self.pages.values().map(|items| items.len() as u64).sum()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Moves a page's items out of the scan. Empty if the page was never scanned.
    pub fn take(&mut self, page: i64) -> Vec<CatalogItem> {
        self.pages.remove(&page).unwrap_or_default()
    }
}

/// Reads pages of the catalog list endpoint.
#[derive(Clone)]
pub struct CatalogClient {
    transport: Arc<dyn HttpTransport>,
    config: Arc<CrawlerConfig>,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl CatalogClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: Arc<CrawlerConfig>,
        events: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            config,
            events,
            cancel,
        }
    }

    /// Fetches one page. Any failure is reported through the event sink and
    /// yields an empty page; a cancelled run never issues the request.
    pub async fn fetch_page(&self, page: i64) -> Vec<CatalogItem> {
        if self.cancel.is_cancelled() {
            return Vec::new();
        }

        match self.try_fetch_page(page).await {
            Ok(items) => {
                debug!(page, items = items.len(), "fetched catalog page");
                items
            }
            Err(e) => {
                warn!(page, error = %e, "catalog page fetch failed");
                self.events
                    .on_log(&format!("Failed to fetch page {page}: {e}"));
                Vec::new()
            }
        }
    }

    async fn try_fetch_page(&self, page: i64) -> Result<Vec<CatalogItem>, CatalogError> {
        let request = HttpRequest::get(self.config.page_url(page), self.config.page_timeout)
            .header("user-agent", self.config.user_agent.as_str());
        let resp = self.transport.get(request).await?;
        if !resp.is_success() {
            return Err(CatalogError::Status(resp.status));
        }
        Ok(parse_catalog_page(&resp.body)?)
    }

    /// Fetches every page of the range in order and keeps the results.
    pub async fn scan_pages(&self, pages: RangeInclusive<i64>) -> CatalogScan {
        let mut scan = CatalogScan::default();
        for page in pages {
            let items = self.fetch_page(page).await;
            scan.pages.insert(page, items);
        }
        scan
    }

    /// Total number of items across the range, one fetch per page.
    pub async fn count_items(&self, pages: RangeInclusive<i64>) -> u64 {
        self.scan_pages(pages).await.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, RecordingSink};

    const PAGE_1: &str = "http://catalog.test/list?page=1&size=20";
    const PAGE_2: &str = "http://catalog.test/list?page=2&size=20";
    const PAGE_3: &str = "http://catalog.test/list?page=3&size=20";

    fn config() -> Arc<CrawlerConfig> {
        Arc::new(CrawlerConfig {
            catalog_endpoint: "http://catalog.test/list?page={page}&size={page_size}".into(),
            ..Default::default()
        })
    }

    fn client(
        transport: Arc<MockTransport>,
        sink: Arc<RecordingSink>,
        cancel: CancellationToken,
    ) -> CatalogClient {
        CatalogClient::new(transport, config(), sink, cancel)
    }

    #[test]
    fn parses_title_and_cover() {
        let body = br#"{"code":0,"data":{"list":[{"title":"Frieren","cover":"http://img.test/f.jpg","badge":"x"}]}}"#;
        let items = parse_catalog_page(body).unwrap();
        assert_eq!(items, vec![CatalogItem::new("Frieren", "http://img.test/f.jpg")]);
    }

    #[test]
    fn missing_fields_fall_back() {
        let body = br#"{"data":{"list":[{"cover":"http://img.test/a.jpg"},{"title":null,"cover":"http://img.test/b.jpg"},{"title":"NoCover"},{"title":42,"cover":7}]}}"#;
        let items = parse_catalog_page(body).unwrap();
        assert_eq!(items[0], CatalogItem::new(UNKNOWN_TITLE, "http://img.test/a.jpg"));
        assert_eq!(items[1], CatalogItem::new("", "http://img.test/b.jpg"));
        assert_eq!(items[2], CatalogItem::new("NoCover", ""));
        assert_eq!(items[3], CatalogItem::new("42", ""));
    }

    #[test]
    fn body_without_list_is_empty_page() {
        assert!(parse_catalog_page(br#"{"code":-404,"message":"nope"}"#).unwrap().is_empty());
        assert!(parse_catalog_page(br#"{"data":{"list":null}}"#).unwrap().is_empty());
    }

    #[test]
    fn non_json_body_is_an_error() {
        assert!(parse_catalog_page(b"<html>oops</html>").is_err());
    }

    #[tokio::test]
    async fn fetch_sends_user_agent_and_page_timeout() {
        let transport = Arc::new(MockTransport::new().with_catalog_page(PAGE_1, &[("A", "http://img.test/a.jpg")]));
        let sink = Arc::new(RecordingSink::new());
        let items = client(transport.clone(), sink, CancellationToken::new())
            .fetch_page(1)
            .await;

        assert_eq!(items.len(), 1);
        let calls = transport.calls();
        assert_eq!(calls[0].url, PAGE_1);
        assert_eq!(calls[0].timeout, std::time::Duration::from_secs(15));
        assert!(calls[0].headers.iter().any(|(k, _)| k == "user-agent"));
    }

    #[tokio::test]
    async fn cancelled_fetch_issues_no_request() {
        let transport = Arc::new(MockTransport::new().with_catalog_page(PAGE_1, &[("A", "http://img.test/a.jpg")]));
        let sink = Arc::new(RecordingSink::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let items = client(transport.clone(), sink, cancel).fetch_page(1).await;
        assert!(items.is_empty());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn failures_are_logged_and_yield_empty_pages() {
        let transport = Arc::new(
            MockTransport::new()
                .with_failure(PAGE_1, "connection reset")
                .with_response(PAGE_2, 502, "bad gateway")
                .with_response(PAGE_3, 200, "not json"),
        );
        let sink = Arc::new(RecordingSink::new());
        let client = client(transport, sink.clone(), CancellationToken::new());

        for page in 1..=3 {
            assert!(client.fetch_page(page).await.is_empty());
        }
        let logs = sink.logs();
        assert_eq!(logs.len(), 3);
        assert!(logs[0].starts_with("Failed to fetch page 1") && logs[0].contains("connection reset"));
        assert!(logs[1].contains("502"));
        assert!(logs[2].starts_with("Failed to fetch page 3"));
    }

    #[tokio::test]
    async fn count_matches_independent_fetches() {
        let transport = Arc::new(
            MockTransport::new()
                .with_catalog_page(PAGE_1, &[("A", "a"), ("B", "b"), ("C", "c")])
                .with_catalog_page(PAGE_2, &[])
                .with_catalog_page(PAGE_3, &[("D", "d"), ("", "e")]),
        );
        let sink = Arc::new(RecordingSink::new());
        let client = client(transport.clone(), sink, CancellationToken::new());

        let mut independent = 0;
        for page in 1..=3 {
            independent += client.fetch_page(page).await.len() as u64;
        }
        assert_eq!(client.count_items(1..=3).await, independent);
        assert_eq!(independent, 5);
    }

    #[tokio::test]
    async fn scan_fetches_pages_in_order_and_keeps_items() {
        let transport = Arc::new(
            MockTransport::new()
                .with_catalog_page(PAGE_1, &[("A", "a")])
                .with_catalog_page(PAGE_2, &[("B", "b"), ("C", "c")]),
        );
        let sink = Arc::new(RecordingSink::new());
        let mut scan = client(transport.clone(), sink, CancellationToken::new())
            .scan_pages(1..=2)
            .await;

        let urls: Vec<_> = transport.calls().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec![PAGE_1.to_string(), PAGE_2.to_string()]);
        assert_eq!(scan.total(), 3);
        assert_eq!(scan.page_count(), 2);
        assert_eq!(scan.take(2).len(), 2);
        assert!(scan.take(2).is_empty());
    }
}
