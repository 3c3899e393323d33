//!
//! src/testing.rs
//!
//! Fixture pages and an in-process page fetcher shared by the unit tests
//!

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::{self, ChartConfig};
use crate::errors::CrawlerError;
use crate::fetch::PageFetcher;

pub const CHART_A: &str = "https://www.beatport.com/chart/weekend-picks-2026-week-2/876342";
pub const CHART_B: &str = "https://www.beatport.com/chart/weekend-picks-2026-week-3/876999";

pub fn chart_config() -> ChartConfig {
    config::build_config(|_| None).unwrap().chart
}

pub fn label_url(href: &str) -> String {
    format!("https://www.beatport.com{href}")
}

fn slug(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}

pub fn row_html(
    title: Option<&str>,
    artists: &[&str],
    genre: &str,
    label: Option<(&str, &str)>,
    release: &str
) -> String {
    let title_html = title
        .map(|t| format!(r#"<a href="/track/{}/1"><span>{t}</span></a>"#, slug(t)))
        .unwrap_or_default();
    let artists_html: String = artists.iter()
        .map(|a| format!(r#"<a href="/artist/{}/1">{a}</a>"#, slug(a)))
        .collect();
    let label_html = label
        .map(|(name, href)| format!(r#"<a href="{href}">{name}</a>"#))
        .unwrap_or_default();
    let art = slug(title.unwrap_or("untitled"));

    format!(r#"
<div class="Table-style__TableRow-sc-5 row">
  <div class="Table-style__TableCell-sc-5 cell artwork-cell"><a class="artwork" href="/track/{art}/1"><img src="https://geo-media.example/image_size/95x95/{art}.jpg"/></a></div>
  <div class="Table-style__TableCell-sc-5 cell title">{title_html}<div class="ArtistNames-sc-7">{artists_html}</div></div>
  <div class="Table-style__TableCell-sc-5 cell label">{label_html}</div>
  <div class="Table-style__TableCell-sc-5 cell bpm"><div>{genre}</div><div>124 BPM</div></div>
  <div class="Table-style__TableCell-sc-5 cell date">{release}</div>
</div>"#)
}

pub fn chart_page(rows: &[String]) -> String {
    format!(r#"<!DOCTYPE html>
<html><body>
<div class="ChartDetailCard-style__ImageWrapper-sc-9"><img src="https://geo-media.example/chart/cover.jpg" alt="cover"/></div>
<div class="ChartDetailCard-style__Info-sc-9"><p>Curator</p><span>Beatport</span></div>
<div class="ChartDetailCard-style__Info-sc-9"><p>Date Created</p><span>2026-01-09</span></div>
<div class="Table-style__Table-sc-1">{}</div>
</body></html>"#, rows.concat())
}

pub fn label_page(label: &str, src: &str) -> String {
    format!(r#"<html><body>
<img src="https://geo-media.example/site/logo.png" alt="Beatport"/>
<img src="{src}" alt="{label}"/>
</body></html>"#)
}

/// Serves registered pages, counts every request per url
#[derive(Default)]
pub struct FakePages {
    pages: Mutex<HashMap<String, String>>,
    hits: Mutex<HashMap<String, usize>>,
    fail_once: Mutex<HashSet<String>>,
}

impl FakePages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, body: String) -> Self {
        self.pages.lock().unwrap().insert(url.to_string(), body);
        self
    }

    /// First request for url fails, later ones are served
    pub fn failing_once(self, url: &str) -> Self {
        self.fail_once.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl PageFetcher for FakePages {
    async fn fetch(&self, url: &str) -> Result<String, CrawlerError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
        if self.fail_once.lock().unwrap().remove(url) {
            return Err(CrawlerError::Http(format!("connection reset: {url}")));
        }
        self.pages.lock().unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| CrawlerError::Http(format!("status 404 Not Found for {url}")))
    }
}
