//!
//! src/extract.rs  Andrew Belles  Sept 14th, 2025
//!
//! Pulls track rows, chart header metadata and label images out of
//! chart / label html. All selector knowledge about the site lives here
//!

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::config::ChartConfig;
use crate::errors::CrawlerError;
use crate::types::{ChartMeta, RawTrackRow};

/// Whatever knows how to read a chart site's markup
pub trait ChartExtractor: Send + Sync {
    /// Table rows in page order, unvalidated
    fn tracks(&self, page: &str) -> Vec<RawTrackRow>;
    fn chart_meta(&self, page: &str) -> ChartMeta;
    /// src of the image on a label page whose alt is the label's name
    fn label_image(&self, page: &str, label: &str) -> Option<String>;
}

fn selector(css: &str) -> Result<Selector, CrawlerError> {
    Selector::parse(css)
        .map_err(|e| CrawlerError::Parse(format!("selector {css}: {e:?}")))
}

fn pattern(re: &str) -> Result<Regex, CrawlerError> {
    Regex::new(re).map_err(|e| CrawlerError::Parse(format!("regex {re}: {e}")))
}

/// Trimmed text content, None when it is empty
fn text_of(element: ElementRef) -> Option<String> {
    let text = element.text().collect::<String>().trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

fn class_matches(element: &ElementRef, re: &Regex) -> bool {
    element.value().attr("class").is_some_and(|c| re.is_match(c))
}

pub struct BeatportExtractor {
    row: Selector,
    title: Selector,
    artists: Selector,
    genre: Selector,
    div: Selector,
    link: Selector,
    artwork: Selector,
    release: Selector,
    paragraph: Selector,
    span: Selector,
    img: Selector,

    label_cell: Regex,
    info_card: Regex,
    image_wrapper: Regex,

    artwork_thumb: String,
    full_size: String,
}

impl BeatportExtractor {
    pub fn new(cfg: &ChartConfig) -> Result<Self, CrawlerError> {
        Ok( Self {
            row: selector(r#"div[class*="TableRow"]"#)?,
            title: selector(r#"div[class*="title"] span"#)?,
            artists: selector(r#"div[class*="ArtistNames"] a"#)?,
            genre: selector(r#"div[class*="bpm"] div"#)?,
            div: selector("div")?,
            link: selector("a")?,
            artwork: selector("a.artwork img")?,
            release: selector(r#"div[class*="cell"][class*="date"]"#)?,
            paragraph: selector("p")?,
            span: selector("span")?,
            img: selector("img")?,

            label_cell: pattern(r"Table-style__TableCell.*label")?,
            info_card: pattern(r"ChartDetailCard-style__Info")?,
            image_wrapper: pattern(r"ChartDetailCard-style__ImageWrapper")?,

            artwork_thumb: cfg.artwork_thumb.clone(),
            full_size: cfg.full_size.clone(),
        })
    }

    fn parse_row(&self, row: ElementRef) -> RawTrackRow {
        let title = row.select(&self.title).next().and_then(text_of);

        let artists: Vec<String> = row.select(&self.artists)
            .filter_map(text_of)
            .collect();
        let artist = if artists.is_empty() { None } else { Some(artists.join(", ")) };

        let genre = row.select(&self.genre).next().and_then(text_of);

        let label_link = row.select(&self.div)
            .find(|div| class_matches(div, &self.label_cell))
            .and_then(|cell| cell.select(&self.link).next());
        let label = label_link.and_then(text_of);
        let label_href = label_link
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);

        let artwork = row.select(&self.artwork).next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| src.replace(&self.artwork_thumb, &self.full_size));

        let release_text = row.select(&self.release).next().and_then(text_of);

        RawTrackRow { artist, title, genre, label, label_href, artwork, release_text }
    }
}

impl ChartExtractor for BeatportExtractor {
    fn tracks(&self, page: &str) -> Vec<RawTrackRow> {
        let document = Html::parse_document(page);
        document.select(&self.row)
            .map(|row| self.parse_row(row))
            .collect()
    }

    fn chart_meta(&self, page: &str) -> ChartMeta {
        let document = Html::parse_document(page);

        let created = document.select(&self.div)
            .filter(|div| class_matches(div, &self.info_card))
            .find_map(|div| {
                let p = div.select(&self.paragraph).next()?;
                if !p.text().collect::<String>().contains("Date Created") {
                    return None;
                }
                div.select(&self.span).next().and_then(text_of)
            });

        let image = document.select(&self.div)
            .find(|div| class_matches(div, &self.image_wrapper))
            .and_then(|wrapper| wrapper.select(&self.img).next())
            .and_then(|img| img.value().attr("src"))
            .filter(|src| !src.is_empty())
            .map(str::to_string);

        ChartMeta { created, image }
    }

    fn label_image(&self, page: &str, label: &str) -> Option<String> {
        let document = Html::parse_document(page);
        document.select(&self.img)
            .find(|img| img.value().attr("alt") == Some(label))
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string)
    }
}
