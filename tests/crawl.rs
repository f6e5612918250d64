use cover_crawler::prelude::*;
use cover_crawler::testing::{catalog_body, MemoryFileSink, MockTransport, RecordingSink};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const ENDPOINT: &str = "http://catalog.test/list?page={page}&pagesize={page_size}";

fn page_url(page: i64) -> String {
    format!("http://catalog.test/list?page={page}&pagesize=20")
}

fn cover_url(page: i64, i: usize) -> String {
    format!("http://img.test/{page}-{i}.jpg")
}

/// `pages` pages of 20 valid items each, every cover answering 200.
fn full_catalog(pages: i64, delay: Option<Duration>) -> MockTransport {
    let mut transport = MockTransport::new();
    if let Some(delay) = delay {
        transport = transport.with_delay(delay);
    }
    for page in 1..=pages {
        let titles: Vec<String> = (0..20).map(|i| format!("Show {page}-{i}")).collect();
        let covers: Vec<String> = (0..20).map(|i| cover_url(page, i)).collect();
        let items: Vec<(&str, &str)> = titles
            .iter()
            .zip(&covers)
            .map(|(t, c)| (t.as_str(), c.as_str()))
            .collect();
        transport.set_response(page_url(page), 200, catalog_body(&items));
        for cover in &covers {
            transport.set_response(cover.clone(), 200, b"jpeg".to_vec());
        }
    }
    transport
}

fn config() -> CrawlerConfig {
    CrawlerConfig {
        catalog_endpoint: ENDPOINT.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn two_full_pages_download_everything() {
    let transport = Arc::new(full_catalog(2, None));
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("nested").join("covers");
    let sink = Arc::new(RecordingSink::new());
    let controller = CrawlController::new(config(), transport.clone(), Arc::new(LocalFileSink), sink.clone());

    let summary = controller
        .start(CrawlRequest::new(1, 2, dest.clone()))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunPhase::Completed);
    assert_eq!(summary.downloaded, 40);
    assert_eq!(summary.total, 40);
    assert_eq!(summary.progress().percent, 100.0);
    assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 40);
    assert_eq!(std::fs::read(dest.join("Show 1-0.jpg")).unwrap(), b"jpeg");

    // counting pass results are reused, so each page is fetched once
    assert_eq!(transport.call_count(&page_url(1)), 1);
    assert_eq!(transport.call_count(&page_url(2)), 1);

    let progress = sink.progress();
    assert_eq!(progress.first().unwrap().downloaded, 0);
    assert_eq!(progress.len(), 41);
    assert_eq!(progress.iter().map(|p| p.downloaded).max(), Some(40));
    assert!(progress.iter().any(|p| p.percent == 100.0));

    let statuses = sink.statuses();
    assert_eq!(statuses.first().map(String::as_str), Some("Crawling..."));
    assert!(statuses.contains(&"Preparing to download 40 covers".to_string()));
    assert_eq!(statuses.last().map(String::as_str), Some("Completed, downloaded 40 covers"));
    assert_eq!(sink.run_states(), vec![true, false]);

    let logs = sink.logs();
    assert!(logs.contains(&"Fetching page 1...".to_string()));
    assert!(logs.contains(&"Fetching page 2...".to_string()));
    assert!(logs.last().unwrap().starts_with("===== Crawl finished, saved to"));
}

#[tokio::test]
async fn refetch_mode_fetches_each_page_twice() {
    let transport = Arc::new(full_catalog(2, None));
    let files = Arc::new(MemoryFileSink::new());
    let controller = CrawlController::new(
        CrawlerConfig {
            refetch_pages: true,
            ..config()
        },
        transport.clone(),
        files.clone(),
        Arc::new(RecordingSink::new()),
    );

    let summary = controller
        .start(CrawlRequest::new(1, 2, "/covers"))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.downloaded, summary.total);
    assert_eq!(transport.call_count(&page_url(1)), 2);
    assert_eq!(transport.call_count(&page_url(2)), 2);
    assert_eq!(files.file_count(), 40);
}

#[tokio::test]
async fn item_without_cover_is_skipped() {
    let transport = Arc::new(
        MockTransport::new()
            .with_catalog_page(page_url(1), &[("Foo", ""), ("Bar", "http://img.test/bar.jpg")])
            .with_response("http://img.test/bar.jpg", 200, b"jpeg".to_vec()),
    );
    let files = Arc::new(MemoryFileSink::new());
    let sink = Arc::new(RecordingSink::new());
    let controller = CrawlController::new(config(), transport.clone(), files.clone(), sink.clone());

    let summary = controller
        .start(CrawlRequest::new(1, 1, "/covers"))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    // the skipped item still counts toward the total computed up front
    assert_eq!(summary.total, 2);
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.outcome, RunPhase::Completed);
    assert!(sink.logs().contains(&"Skipping invalid item: Foo".to_string()));
    assert!(files.file(Path::new("/covers/Foo.jpg")).is_none());
    assert_eq!(transport.calls_with_prefix("http://img.test/"), 1);
}

#[tokio::test]
async fn empty_catalog_fails_with_warning() {
    let transport = Arc::new(
        MockTransport::new()
            .with_catalog_page(page_url(1), &[])
            .with_failure(page_url(2), "connection refused"),
    );
    let files = Arc::new(MemoryFileSink::new());
    let sink = Arc::new(RecordingSink::new());
    let controller = CrawlController::new(config(), transport.clone(), files.clone(), sink.clone());

    let summary = controller
        .start(CrawlRequest::new(1, 2, "/covers"))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert!(matches!(summary.outcome, RunPhase::Failed(_)));
    assert_eq!(summary.downloaded, 0);
    assert_eq!(sink.warnings().len(), 1);
    assert!(sink.errors().is_empty());
    assert!(sink.progress().is_empty());
    assert!(!sink.logs().iter().any(|l| l.starts_with("Fetching page")));
    assert_eq!(sink.statuses().last().map(String::as_str), Some("Stopped, downloaded nothing"));
    assert_eq!(transport.calls().len(), 2);
    assert_eq!(files.file_count(), 0);
    assert_eq!(files.created_dirs(), vec![Path::new("/covers").to_path_buf()]);
}

#[tokio::test]
async fn page_range_is_clamped() {
    let transport = Arc::new(full_catalog(3, None));
    let controller = CrawlController::new(
        config(),
        transport.clone(),
        Arc::new(MemoryFileSink::new()),
        Arc::new(RecordingSink::new()),
    );

    let summary = controller
        .start(CrawlRequest::new(3, 1, "/covers"))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(summary.outcome, RunPhase::Completed);
    assert_eq!(summary.total, 20);
    assert_eq!(transport.call_count(&page_url(3)), 1);
    assert_eq!(transport.call_count(&page_url(1)), 0);

    let summary = controller
        .start(CrawlRequest::new(-5, 0, "/covers"))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(summary.total, 20);
    assert_eq!(transport.call_count(&page_url(1)), 1);
}

#[tokio::test]
async fn stop_halts_paging_but_lets_in_flight_downloads_finish() {
    let transport = Arc::new(full_catalog(3, Some(Duration::from_millis(30))));
    let files = Arc::new(MemoryFileSink::new());
    let (sink, mut events) = ChannelSink::new();
    let controller = CrawlController::new(
        CrawlerConfig {
            refetch_pages: true,
            ..config()
        },
        transport.clone(),
        files.clone(),
        Arc::new(sink),
    );

    let handle = controller
        .start(CrawlRequest::new(1, 3, "/covers"))
        .await
        .unwrap();

    while let Some(event) = events.recv().await {
        if event == CrawlEvent::Log("Fetching page 2...".into()) {
            assert!(controller.stop().await);
            break;
        }
    }
    let summary = handle.wait().await.unwrap();

    assert_eq!(summary.outcome, RunPhase::Cancelled);
    // page 3 was only ever fetched by the counting pass
    assert_eq!(transport.call_count(&page_url(3)), 1);
    assert!(summary.downloaded < summary.total);
    // every download that reached the network completed and was counted
    let started = transport.calls_with_prefix("http://img.test/") as u64;
    assert_eq!(summary.downloaded, started);
    assert_eq!(files.file_count() as u64, summary.downloaded);
    assert!(!controller.stop().await);
    assert_eq!(controller.phase().await, RunPhase::Idle);
}

#[tokio::test]
async fn stop_during_count_pass_cancels_without_warning() {
    let transport = Arc::new(full_catalog(3, Some(Duration::from_millis(30))));
    let sink = Arc::new(RecordingSink::new());
    let controller = CrawlController::new(
        config(),
        transport.clone(),
        Arc::new(MemoryFileSink::new()),
        sink.clone(),
    );

    let handle = controller
        .start(CrawlRequest::new(1, 3, "/covers"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(controller.stop().await);
    let summary = handle.wait().await.unwrap();

    assert_eq!(summary.outcome, RunPhase::Cancelled);
    assert_eq!(summary.downloaded, 0);
    assert!(sink.warnings().is_empty());
    assert!(sink.logs().contains(&"Crawl stopped by user".to_string()));
    assert_eq!(transport.call_count(&page_url(2)), 0);
    assert_eq!(transport.calls_with_prefix("http://img.test/"), 0);
}

#[tokio::test]
async fn failed_downloads_do_not_stop_the_run() {
    let transport = Arc::new(
        MockTransport::new()
            .with_catalog_page(
                page_url(1),
                &[
                    ("Ok", "http://img.test/ok.jpg"),
                    ("Gone", "http://img.test/gone.jpg"),
                    ("Reset", "http://img.test/reset.jpg"),
                ],
            )
            .with_response("http://img.test/ok.jpg", 200, b"jpeg".to_vec())
            .with_response("http://img.test/gone.jpg", 404, Vec::new())
            .with_failure("http://img.test/reset.jpg", "connection reset"),
    );
    let sink = Arc::new(RecordingSink::new());
    let controller = CrawlController::new(config(), transport, Arc::new(MemoryFileSink::new()), sink.clone());

    let summary = controller
        .start(CrawlRequest::new(1, 1, "/covers"))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunPhase::Completed);
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.failed, 2);
    assert!(sink.errors().is_empty());
    assert!(sink.logs().contains(&"Download failed: Gone, status 404".to_string()));
    assert_eq!(sink.statuses().last().map(String::as_str), Some("Completed, downloaded 1 covers"));
}

#[tokio::test]
async fn stop_while_pool_drains_cancels_queued_downloads() {
    let transport = Arc::new(full_catalog(2, Some(Duration::from_millis(40))));
    let files = Arc::new(MemoryFileSink::new());
    let (sink, mut events) = ChannelSink::new();
    // cached pages: the page loop submits all 40 items before the first cover lands
    let controller = CrawlController::new(config(), transport.clone(), files.clone(), Arc::new(sink));

    let handle = controller
        .start(CrawlRequest::new(1, 2, "/covers"))
        .await
        .unwrap();

    let mut statuses = Vec::new();
    while let Some(event) = events.recv().await {
        match event {
            CrawlEvent::Status(status) => statuses.push(status),
            CrawlEvent::Progress(p) if p.downloaded > 0 => {
                assert!(controller.stop().await);
                break;
            }
            _ => {}
        }
    }
    let summary = handle.wait().await.unwrap();
    while let Ok(event) = events.try_recv() {
        if let CrawlEvent::Status(status) = event {
            statuses.push(status);
        }
    }

    assert_eq!(summary.outcome, RunPhase::Cancelled);
    assert!(summary.downloaded > 0);
    assert!(summary.downloaded < summary.total);
    assert_eq!(transport.call_count(&page_url(1)), 1);
    assert_eq!(transport.call_count(&page_url(2)), 1);
    // queued items never reached the network
    let started = transport.calls_with_prefix("http://img.test/") as u64;
    assert_eq!(summary.downloaded, started);
    assert_eq!(files.file_count() as u64, summary.downloaded);
    assert_eq!(
        statuses.last().cloned(),
        Some(format!("Completed, downloaded {} covers", summary.downloaded))
    );
}
