//!
//! src/crawler.rs  Andrew Belles  Sept 13th, 2025
//!
//! Defines the chart ingestion pipeline. A chart is fetched, its rows
//! validated, every distinct label resolved concurrently, and only then
//! are tracks committed in page order, one transaction per chart
//!

use std::{collections::HashSet, sync::Arc};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, ConcurrencyConfig, LABEL_WORKERS};
use crate::errors::CrawlerError;
use crate::extract::ChartExtractor;
use crate::fetch::PageFetcher;
use crate::labels::{LabelImageCache, LabelImageResolver};
use crate::persistent::Persistent;
use crate::sink::RawPageSink;
use crate::types::{ChartInfo, ChartMeta, ChartSummary, ChartTrack, InsertOutcome, RunSummary, UNKNOWN};

const CHART_NAME_PATTERN: &str = r"/chart/(.+)/\d+$";

#[derive(Clone, Debug)]
pub struct CrawlerLimits {
    pub label_workers: usize,
    pub show_progress: bool,
}

impl Default for CrawlerLimits {
    fn default() -> Self {
        Self {
            label_workers: LABEL_WORKERS,
            show_progress: false
        }
    }
}

impl From<&ConcurrencyConfig> for CrawlerLimits {
    fn from(cfg: &ConcurrencyConfig) -> Self {
        Self {
            label_workers: cfg.label_workers.max(1),
            show_progress: cfg.show_progress
        }
    }
}

/// Upper-cases a letter that follows a non-letter, lower-cases the rest
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(c);
            prev_letter = false;
        }
    }
    out
}

fn progress_bar(len: u64, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::hidden());
    }
    let pb = ProgressBar::new(len);
    match ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}") {
        Ok(style) => pb.set_style(style.progress_chars("=> ")),
        Err(e) => debug!(error = %e, "progress.style"),
    }
    pb
}

/// Label -> href over valid tracks, first occurrence wins, page order kept
fn distinct_labels(tracks: &[ChartTrack]) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    tracks.iter()
        .filter(|t| t.label != UNKNOWN)
        .filter_map(|t| Some((t.label.clone(), t.label_href.clone()?)))
        .filter(|(label, _)| seen.insert(label.clone()))
        .collect()
}

pub struct Crawler {
    // backbone
    pages: Arc<dyn PageFetcher>,
    extractor: Arc<dyn ChartExtractor>,
    db: Arc<Persistent>,
    sink: Option<RawPageSink>,
    limits: CrawlerLimits,

    labels: LabelImageResolver,
    chart_name: Regex,
}

impl Crawler {
    /// Label cache starts warm with every image the store already knows
    pub async fn new(
        cfg: &AppConfig,
        db: Persistent,
        pages: Arc<dyn PageFetcher>,
        extractor: Arc<dyn ChartExtractor>,
        sink: Option<RawPageSink>,
        limits: CrawlerLimits
    ) -> Result<Self, CrawlerError> {
        let known = db.label_images().await?;
        debug!(labels = known.len(), "label.cache.seed");

        let labels = LabelImageResolver::new(
            pages.clone(),
            extractor.clone(),
            LabelImageCache::seeded(known),
            &cfg.chart
        );
        let chart_name = Regex::new(CHART_NAME_PATTERN)
            .map_err(|e| CrawlerError::Parse(format!("regex {CHART_NAME_PATTERN}: {e}")))?;

        Ok( Self {
            pages,
            extractor,
            db: Arc::new(db),
            sink,
            limits,
            labels,
            chart_name
        })
    }

    pub fn store(&self) -> &Persistent {
        &self.db
    }

    /// "Weekend Picks 2026 Week 2" from ".../chart/weekend-picks-2026-week-2/876342",
    /// the url itself when it does not look like a chart url
    pub fn chart_name(&self, url: &str) -> String {
        match self.chart_name.captures(url).and_then(|c| c.get(1)) {
            Some(slug) => title_case(&slug.as_str().replace('-', " ")),
            None => {
                warn!(url = %url, "chart.name.fallback");
                url.to_string()
            }
        }
    }

    async fn chart_meta(&self, url: &str) -> ChartMeta {
        match self.pages.fetch(url).await {
            Ok(page) => self.extractor.chart_meta(&page),
            Err(e) => {
                warn!(url = %url, error = %e, "chart.meta.error");
                ChartMeta::default()
            }
        }
    }

    fn archive(&self, chart_name: &str, page: &str) {
        let Some(sink) = self.sink.as_ref() else { return };
        match sink.write_page(chart_name, page) {
            Ok(path) => debug!(chart = %chart_name, path = %path.display(), "chart.archived"),
            Err(e) => warn!(chart = %chart_name, error = %e, "chart.archive.error"),
        }
    }

    fn validate(&self, chart_name: &str, page: &str) -> (Vec<ChartTrack>, u64) {
        let rows = self.extractor.tracks(page);
        let pb = progress_bar(rows.len() as u64, self.limits.show_progress);
        pb.set_message(chart_name.to_string());

        let mut valid = Vec::with_capacity(rows.len());
        let mut invalid = 0_u64;
        for row in rows {
            match row.validate() {
                Some(track) => valid.push(track),
                None => invalid += 1,
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        (valid, invalid)
    }

    pub async fn ingest_chart(&self, url: &str) -> Result<ChartSummary, CrawlerError> {
        let name = self.chart_name(url);

        if self.db.chart_exists(&name).await? {
            info!(chart = %name, "chart.skip");
            return Ok(ChartSummary {
                chart_name: name,
                already_present: true,
                ..Default::default()
            });
        }

        let meta = self.chart_meta(url).await;
        let page = self.pages.fetch(url).await?;
        self.archive(&name, &page);

        let (tracks, invalid) = self.validate(&name, &page);
        debug!(chart = %name, valid = tracks.len(), invalid, "chart.rows");

        // every label is settled before the first commit
        let wanted = distinct_labels(&tracks);
        info!(chart = %name, labels = wanted.len(), "labels.resolve");
        let images = self.labels.resolve_all(wanted, self.limits.label_workers).await;

        let chart = ChartInfo { name, source_url: url.to_string(), meta };
        let mut summary = ChartSummary {
            chart_name: chart.name.clone(),
            skipped: invalid,
            invalid,
            labels_resolved: images.len() as u64,
            ..Default::default()
        };

        let mut snapshot = self.db.begin_chart().await?;
        for track in &tracks {
            let label_img = images.get(&track.label).map(String::as_str).unwrap_or("");
            match snapshot.insert_track(&chart, track, label_img).await? {
                InsertOutcome::Added { is_duplicate } => {
                    summary.added += 1;
                    if is_duplicate {
                        debug!(artist = %track.artist, title = %track.title, "track.duplicate");
                    }
                }
                InsertOutcome::AlreadyPresent => summary.skipped += 1,
            }
        }
        snapshot.commit().await?;

        info!(
            chart = %summary.chart_name,
            added = summary.added,
            skipped = summary.skipped,
            invalid = summary.invalid,
            labels = summary.labels_resolved,
            "chart.done"
        );
        Ok(summary)
    }

    /// Every url in order; one chart failing does not stop the rest
    pub async fn run(&self, urls: &[String]) -> RunSummary {
        let mut run = RunSummary::default();
        for url in urls {
            match self.ingest_chart(url).await {
                Ok(chart) => run.record(chart),
                Err(e) => {
                    error!(url = %url, error = %e, "chart.failed");
                    run.failed.push((url.clone(), e.to_string()));
                }
            }
        }
        info!(
            charts = run.charts.len(),
            failed = run.failed.len(),
            added = run.added,
            skipped = run.skipped,
            "run.done"
        );
        run
    }
}
