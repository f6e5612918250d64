// src/main.rs

use anyhow::{bail, Result};
use clap::Parser;
use cover_crawler::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cover-crawler")]
#[command(about = "Download cover images for every entry of a paginated catalog")]
#[command(version)]
struct Cli {
    /// First page to crawl (values below 1 are treated as 1)
    #[arg(long, short = 's', default_value_t = 1)]
    start_page: i64,

    /// Last page to crawl (values before the first page crawl a single page)
    #[arg(long, short = 'e', default_value_t = 2)]
    end_page: i64,

    /// Directory the covers are saved to
    #[arg(long, short = 'd', default_value = "covers")]
    dest: PathBuf,

    /// Number of covers downloaded at the same time
    #[arg(long, short = 'w', env = "COVER_CRAWLER_WORKERS")]
    workers: Option<usize>,

    /// List endpoint template with {page} and {page_size} placeholders
    #[arg(long, env = "COVER_CRAWLER_ENDPOINT")]
    endpoint: Option<String>,

    /// Fetch every page again in the download phase instead of reusing the count pass
    #[arg(long)]
    refetch_pages: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> CrawlerConfig {
        let mut config = CrawlerConfig::default();
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(endpoint) = &self.endpoint {
            config.catalog_endpoint = endpoint.clone();
        }
        config.refetch_pages = self.refetch_pages;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "cover_crawler=debug"
    } else {
        "cover_crawler=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (sink, mut events) = ChannelSink::new();
    let controller = CrawlController::new(
        cli.config(),
        Arc::new(ReqwestTransport::new()?),
        Arc::new(LocalFileSink),
        Arc::new(sink),
    );

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                CrawlEvent::Progress(p) => {
                    println!("[PROGRESS] {}/{} ({:.1}%)", p.downloaded, p.total, p.percent)
                }
                CrawlEvent::Log(message) => println!("{message}"),
                CrawlEvent::Warning(message) => eprintln!("[WARNING] {message}"),
                CrawlEvent::Error(message) => eprintln!("[ERROR] {message}"),
                CrawlEvent::Status(status) => println!("[STATUS] {status}"),
                CrawlEvent::RunState(_) => {}
            }
        }
    });

    let handle = controller
        .start(CrawlRequest::new(cli.start_page, cli.end_page, cli.dest.clone()))
        .await?;

    let stopper = {
        let controller = controller.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                controller.stop().await;
            }
        })
    };

    let summary = handle.wait().await?;
    stopper.abort();
    drop(controller);
    // Give the printer a moment to flush what the workers queued last.
    let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;

    match summary.outcome {
        RunPhase::Failed(reason) => bail!("crawl failed: {reason}"),
        outcome => {
            println!(
                "{:?}: {} downloaded, {} failed, {} skipped of {} into {}",
                outcome,
                summary.downloaded,
                summary.failed,
                summary.skipped,
                summary.total,
                summary.destination.display()
            );
            Ok(())
        }
    }
}
