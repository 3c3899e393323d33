//!
//! src/main.rs  Andrew Belles  Sept 13, 2025
//!
//! Wires config, logging, store and fetcher into the crawler,
//! ingests every configured chart and renders the report
//!
//!

mod crawler;
mod config;
mod dates;
mod extract;
mod fetch;
mod labels;
mod persistent;
mod report;
mod sink;
mod logging;
mod types;

#[cfg(test)]
mod testing;

mod errors;
use crate::errors::CrawlerError;

use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), CrawlerError> {
    let cfgs = config::load_config()?;
    let _logger = logging::init_logging(&cfgs.logging)?;

    let db = persistent::Persistent::init(&cfgs.persistence.db_url).await?;
    let pages = Arc::new(fetch::HttpPageFetcher::new(&cfgs.http, &cfgs.identity)?);
    let extractor = Arc::new(extract::BeatportExtractor::new(&cfgs.chart)?);
    let archive = cfgs.persistence.raw_store_root.as_deref()
        .map(|root| sink::RawPageSink::new(root, cfgs.persistence.raw_zstd_level));
    let limits = crawler::CrawlerLimits::from(&cfgs.concurrency);

    let crawler = crawler::Crawler::new(&cfgs, db, pages, extractor, archive, limits).await?;
    let run = crawler.run(&cfgs.chart.chart_urls).await;
    let stored = crawler.store().count_tracks().await?;
    info!(summary = %serde_json::to_string(&run)?, stored, "run.summary");

    let tracks = crawler.store().all_tracks().await?;
    let path = report::write_report(&cfgs.report, &tracks)?;
    info!(path = %path.display(), charts = run.charts.len(), "report.done");

    if let Some((url, err)) = run.failed.first() {
        error!(failed = run.failed.len(), "run.incomplete");
        return Err(CrawlerError::Http(format!("chart {url} failed: {err}")));
    }

    Ok(())
}
