//!
//! src/report.rs  Andrew Belles  Sept 14th, 2025
//!
//! Renders every stored chart into one self-contained html page,
//! newest chart first, with client-side filtering over genre, label,
//! release date and free text
//!

use std::{collections::{BTreeMap, BTreeSet, HashMap}, io::Write, path::{Path, PathBuf}};

use chrono::NaiveDate;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tracing::info;

use crate::config::ReportConfig;
use crate::dates;
use crate::errors::CrawlerError;
use crate::types::StoredTrack;

const STYLE: &str = include_str!("../assets/report.css");
const SCRIPT: &str = include_str!("../assets/report.js");

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn pastel<R: Rng>(rng: &mut R) -> String {
    format!(
        "rgb({},{},{})",
        rng.gen_range(140..=255),
        rng.gen_range(140..=255),
        rng.gen_range(140..=255)
    )
}

/// One colour per distinct key, drawn in sorted key order
fn palette<'a, R: Rng>(keys: impl Iterator<Item = &'a str>, rng: &mut R) -> HashMap<&'a str, String> {
    keys.collect::<BTreeSet<_>>()
        .into_iter()
        .map(|k| (k, pastel(rng)))
        .collect()
}

struct ChartGroup<'a> {
    name: &'a str,
    created: Option<&'a str>,
    image: Option<&'a str>,
    tracks: Vec<&'a StoredTrack>,
}

impl ChartGroup<'_> {
    fn sort_key(&self) -> Option<NaiveDate> {
        dates::normalize(self.created)
    }

    /// "[09|01|26]", the raw text in parens when it does not parse
    fn date_label(&self) -> Option<String> {
        let raw = self.created.filter(|c| !c.trim().is_empty())?;
        Some(match self.sort_key() {
            Some(d) => d.format("[%d|%m|%y]").to_string(),
            None => format!("({raw})"),
        })
    }
}

/// Charts in first-seen order, then stably sorted newest first with
/// undated charts at the bottom
fn group_charts(tracks: &[StoredTrack]) -> Vec<ChartGroup<'_>> {
    let mut groups: Vec<ChartGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for t in tracks {
        let slot = *index.entry(t.chart_name.as_str()).or_insert_with(|| {
            groups.push(ChartGroup {
                name: &t.chart_name,
                created: t.chart_date_created.as_deref(),
                image: t.chart_image.as_deref(),
                tracks: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].tracks.push(t);
    }

    groups.sort_by_key(|g| std::cmp::Reverse(g.sort_key()));
    groups
}

/// (artist, title) -> every chart holding it, first-seen order
fn charts_by_track(tracks: &[StoredTrack]) -> HashMap<(&str, &str), Vec<&str>> {
    let mut holders: HashMap<(&str, &str), Vec<&str>> = HashMap::new();
    for t in tracks {
        let charts = holders.entry((t.artist.as_str(), t.title.as_str())).or_default();
        if !charts.contains(&t.chart_name.as_str()) {
            charts.push(&t.chart_name);
        }
    }
    holders
}

fn render_track(
    out: &mut String,
    t: &StoredTrack,
    charts: &[&str],
    genre_colors: &HashMap<&str, String>,
    label_colors: &HashMap<&str, String>
) -> Result<(), CrawlerError> {
    let holders = serde_json::to_string(charts)?;
    let duplicate = if t.is_duplicate { r#"<span class="duplicate">!</span>"# } else { "" };
    let genre_bg = genre_colors.get(t.genre.as_str()).map(String::as_str).unwrap_or("#888");
    let label_bg = label_colors.get(t.label.as_str()).map(String::as_str).unwrap_or("#888");

    out.push_str(&format!(
        r#"<div class="track" data-chart="{chart}" data-charts="{holders}" data-genre="{genre}" data-label="{label}" data-artist="{artist}" data-title="{title}" data-date="{date}" data-artwork="{artwork}" data-label-artwork="{label_img}">
<div class="song-line">
<span class="date-tag">{release}</span>
<span class="genre-tag" style="background:{genre_bg}">[{genre}]</span>
<span class="track-title">{artist} &ndash; {title}</span>
<span class="label-tag" style="background:{label_bg}">[{label}]</span>
{duplicate}
</div>
<div class="artwork-box"></div>
</div>
"#,
        chart = escape_html(&t.chart_name),
        holders = escape_html(&holders),
        genre = escape_html(&t.genre),
        label = escape_html(&t.label),
        artist = escape_html(&t.artist),
        title = escape_html(&t.title),
        date = dates::to_iso(t.release_dt),
        artwork = escape_html(t.artwork.as_deref().unwrap_or("")),
        label_img = escape_html(t.label_img.as_deref().unwrap_or("")),
        release = escape_html(&t.release_str),
    ));
    Ok(())
}

pub fn render<R: Rng>(title: &str, tracks: &[StoredTrack], rng: &mut R) -> Result<String, CrawlerError> {
    let genre_colors = palette(tracks.iter().map(|t| t.genre.as_str()), rng);
    let label_colors = palette(tracks.iter().map(|t| t.label.as_str()), rng);
    let holders = charts_by_track(tracks);
    let groups = group_charts(tracks);

    let mut out = String::with_capacity(4096 + tracks.len() * 768);
    out.push_str(&format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{title}</title>
<style>
{style}</style>
</head>
<body>
<div id="toolbar">
<input type="text" id="search-input" placeholder="Search artist, track or label...">
<button id="expand-all">Expand All / Collapse All</button>
<span id="track-count">Tracks: {count}</span>
</div>
<div id="layout">
<div id="genre-sidebar">
<h3>Genres</h3>
"#,
        title = escape_html(title),
        style = STYLE,
        count = tracks.len()
    ));

    let genres: BTreeMap<&str, &String> = genre_colors.iter().map(|(g, c)| (*g, c)).collect();
    for (genre, color) in genres {
        out.push_str(&format!(
            "<span class=\"genre-filter\" style=\"background:{color}\" data-genre=\"{g}\">[{g}]</span>\n",
            g = escape_html(genre)
        ));
    }
    out.push_str("</div>\n<div id=\"content\">\n");

    for group in &groups {
        let cover = group.image
            .map(|src| format!(r#"<img src="{}" alt="{}">"#, escape_html(src), escape_html(group.name)))
            .unwrap_or_default();
        let date = group.date_label()
            .map(|d| format!(r#" <span class="chart-date">{d}</span>"#))
            .unwrap_or_default();

        out.push_str(&format!(
            "<div class=\"chart-block\">\n<div class=\"chart-header\">{cover}<div class=\"chart-name\">{}{date}</div></div>\n<div class=\"chart-tracks\">\n",
            escape_html(group.name)
        ));
        for t in &group.tracks {
            let charts = holders.get(&(t.artist.as_str(), t.title.as_str()))
                .map(Vec::as_slice)
                .unwrap_or_default();
            render_track(&mut out, t, charts, &genre_colors, &label_colors)?;
        }
        out.push_str("</div>\n</div>\n");
    }

    out.push_str("</div>\n</div>\n<script>\n");
    out.push_str(SCRIPT);
    out.push_str("</script>\n</body>\n</html>\n");
    Ok(out)
}

/// Renders and atomically replaces the configured output file
pub fn write_report(cfg: &ReportConfig, tracks: &[StoredTrack]) -> Result<PathBuf, CrawlerError> {
    let html = render(&cfg.title, tracks, &mut SmallRng::from_entropy())?;

    let path = PathBuf::from(&cfg.output_path);
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    std::fs::create_dir_all(&parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
    temp.write_all(html.as_bytes())?;
    temp.persist(&path)
        .map_err(|e| CrawlerError::Report(format!("persist {}: {}", path.display(), e.error)))?;

    info!(path = %path.display(), tracks = tracks.len(), "report.written");
    Ok(path)
}
