//!
//! src/types.rs
//!
//! Typed records flowing between extractor, pipeline, store and report
//!

use chrono::NaiveDate;
use serde::Serialize;

use crate::dates;

pub const UNKNOWN: &str = "Unknown";
pub const NO_RELEASE_TEXT: &str = "NONE";

/// Chart-level metadata scraped from the chart page header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartMeta {
    pub created: Option<String>,
    pub image: Option<String>,
}

/// Identity + metadata of the chart a track is committed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartInfo {
    pub name: String,
    pub source_url: String,
    pub meta: ChartMeta,
}

/// One table row as the extractor saw it, nothing guaranteed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTrackRow {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub genre: Option<String>,
    pub label: Option<String>,
    pub label_href: Option<String>,
    pub artwork: Option<String>,
    pub release_text: Option<String>,
}

/// A row that survived validation and is ready to commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartTrack {
    pub artist: String,
    pub title: String,
    pub genre: String,
    pub label: String,
    pub label_href: Option<String>,
    pub artwork: Option<String>,
    pub release_dt: Option<NaiveDate>,
    pub release_str: String,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl RawTrackRow {
    /// Drops rows without artist or title, fills the documented defaults
    pub fn validate(self) -> Option<ChartTrack> {
        let artist = non_blank(self.artist)?;
        let title  = non_blank(self.title)?;

        let label = non_blank(self.label).unwrap_or_else(|| UNKNOWN.to_string());
        // an unknown label has nothing to resolve
        let label_href = if label == UNKNOWN { None } else { non_blank(self.label_href) };

        let release_text = non_blank(self.release_text);
        let release_dt   = dates::normalize(release_text.as_deref());

        Some(ChartTrack {
            artist,
            title,
            genre: non_blank(self.genre).unwrap_or_else(|| UNKNOWN.to_string()),
            label,
            label_href,
            artwork: non_blank(self.artwork),
            release_dt,
            release_str: release_text.unwrap_or_else(|| NO_RELEASE_TEXT.to_string()),
        })
    }
}

/// Result of committing one track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Added { is_duplicate: bool },
    AlreadyPresent
}

/// A committed row as read back by the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredTrack {
    pub chart_name: String,
    pub chart_date_created: Option<String>,
    pub chart_image: Option<String>,
    pub artist: String,
    pub title: String,
    pub source_url: String,
    pub genre: String,
    pub label: String,
    pub label_img: Option<String>,
    pub artwork: Option<String>,
    pub release_dt: Option<NaiveDate>,
    pub release_str: String,
    pub is_duplicate: bool,
    pub created_at: i64,
}

/// Per-chart counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChartSummary {
    pub chart_name: String,
    pub added: u64,
    pub skipped: u64,           // includes invalid rows
    pub invalid: u64,
    pub labels_resolved: u64,
    pub already_present: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub charts: Vec<ChartSummary>,
    pub failed: Vec<(String, String)>,   // (url, error)
    pub added: u64,
    pub skipped: u64,
}

impl RunSummary {
    pub fn record(&mut self, chart: ChartSummary) {
        self.added += chart.added;
        self.skipped += chart.skipped;
        self.charts.push(chart);
    }
}
