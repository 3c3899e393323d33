//!
//! src/config.rs  Andrew Belles  Sept 13th, 2025
//!
//! Reads environment (and .env) into the typed configuration that every
//! other module is built from
//!

use url::Url;
use std::time;
use crate::CrawlerError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 10000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const DEFAULT_CHART_URL: &str =
    "https://www.beatport.com/chart/weekend-picks-2026-week-2/876342";
pub const DEFAULT_SITE_BASE: &str = "https://www.beatport.com/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

/// Resolution tokens embedded in image urls
pub const LABEL_THUMB_MARKER: &str = "87x87";
pub const ARTWORK_THUMB_MARKER: &str = "95x95";
pub const FULL_SIZE_MARKER: &str = "500x500";

pub const LABEL_WORKERS: usize = 10;

/// Wrapper over a lookup that treats blank values as unset
fn env_opt<F>(lookup: &F, s: &str) -> Option<String>
where F: Fn(&str) -> Option<String> {
    match lookup(s) {
        Some(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_or<F>(lookup: &F, s: &str, default: &str) -> String
where F: Fn(&str) -> Option<String> {
    env_opt(lookup, s).unwrap_or_else(|| default.to_string())
}

/// Ensures that url is http(s), charts and labels are plain web pages
fn ensure_web(url: &Url) -> Result<(), String> {
    match url.scheme() {
        "https" | "http" => Ok(()),
        other => Err(format!("URL must be http(s), got {other}: {url}")),
    }
}

fn ensure_host(url: &Url) -> Result<(), String> {
    match url.host_str() {
        Some(_) => Ok(()),
        None => Err(format!("URL missing host: {url}"))
    }
}

/// Identity every request goes out with
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub user_agent: String,
}

fn build_identity<F>(lookup: &F) -> IdentityConfig
where F: Fn(&str) -> Option<String> {
    IdentityConfig { user_agent: env_or(lookup, "USER_AGENT", DEFAULT_USER_AGENT) }
}

///
/// Which charts to ingest and where their label pages live
///
#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub chart_urls: Vec<String>,   // raw, trimmed; used verbatim for naming
    pub site_base: Url,            // label hrefs are joined onto this
    pub label_thumb: String,
    pub artwork_thumb: String,
    pub full_size: String,
}

fn build_chart<F>(lookup: &F) -> Result<ChartConfig, CrawlerError>
where F: Fn(&str) -> Option<String> {
    // CHART_URLS is whitespace separated, a url never holds raw whitespace.
    // CHART_URL is one url taken verbatim, commas in its query included
    let chart_urls: Vec<String> = match env_opt(lookup, "CHART_URLS") {
        Some(list) => list.split_whitespace().map(str::to_string).collect(),
        None => vec![env_or(lookup, "CHART_URL", DEFAULT_CHART_URL)],
    };

    if chart_urls.is_empty() {
        return Err(CrawlerError::Config("CHART_URLS holds no urls".to_string()));
    }

    // every chart url must at least be fetchable
    for chart_url in &chart_urls {
        let parsed = Url::parse(chart_url)
            .map_err(|e| CrawlerError::Config(
                format!("CHART_URL invalid ({chart_url}): {e}")
            ))?;
        ensure_web(&parsed).map_err(CrawlerError::Config)?;
        ensure_host(&parsed).map_err(CrawlerError::Config)?;
    }

    let site_base = env_or(lookup, "SITE_BASE_URL", DEFAULT_SITE_BASE);
    let mut site_base = Url::parse(&site_base)
        .map_err(|e| CrawlerError::Config(
            format!("SITE_BASE_URL invalid {e}")
        ))?;

    ensure_web(&site_base).map_err(CrawlerError::Config)?;
    ensure_host(&site_base).map_err(CrawlerError::Config)?;

    // ensure trailing slash
    if !site_base.path().ends_with('/') {
        let mut path = site_base.path().to_string();
        path.push('/');
        site_base.set_path(&path);
    }

    Ok( ChartConfig {
        chart_urls,
        site_base,
        label_thumb: LABEL_THUMB_MARKER.to_string(),
        artwork_thumb: ARTWORK_THUMB_MARKER.to_string(),
        full_size: FULL_SIZE_MARKER.to_string(),
    })
}

///
/// Configuration for Http timeouts etc. No retries, a failed fetch stays failed
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
        }
    }
}

///
/// Configuration for persistent storage in sqlite db and the raw page archive
///
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub db_url: String,
    pub raw_store_root: Option<String>,
    pub raw_zstd_level: i32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_url: "sqlite:./data/charts.db".to_string(),
            raw_store_root: None,
            raw_zstd_level: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub output_path: String,
    pub title: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_path: "index.html".to_string(),
            title: "Beatport Tracks".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    pub label_workers: usize,   // ceiling on simultaneous label page fetches
    pub show_progress: bool,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            label_workers: LABEL_WORKERS,
            show_progress: true,
        }
    }
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<LogFormat> {
        match s.to_ascii_lowercase().as_str() {
            "json"   => Some(LogFormat::Json),
            "pretty" => Some(LogFormat::Pretty),
            _ => None
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,chart_crawler=debug,sqlx=warn,reqwest=warn".to_string(),
            format: LogFormat::Json,
            with_ansi: true,
            include_file_line: true,
            include_target: true,
        }
    }
}

///
/// AppConfig which holds everything main needs to wire the crawler
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub identity: IdentityConfig,
    pub chart: ChartConfig,
    pub http: HttpConfig,
    pub persistence: PersistenceConfig,
    pub report: ReportConfig,
    pub concurrency: ConcurrencyConfig,
    pub logging: LoggingConfig
}

/// Builds the config from any key lookup, process env in production
pub fn build_config<F>(lookup: F) -> Result<AppConfig, CrawlerError>
where F: Fn(&str) -> Option<String> {
    let env_to_uint = |s: &str, default: u64| -> Result<u64, CrawlerError> {
        match env_opt(&lookup, s) {
            Some(v) => v.parse::<u64>()
                .map_err(|_| CrawlerError::Config(format!("{s} must be an integer, got {v}"))),
            None => Ok(default)
        }
    };

    let env_to_bool = |s: &str, default: bool| -> bool {
        match env_opt(&lookup, s).as_deref() {
            Some("0") | Some("false") | Some("no") => false,
            Some(_) => true,
            None => default
        }
    };

    let identity = build_identity(&lookup);
    let chart    = build_chart(&lookup)?;

    let mut http = HttpConfig::default();
    http.timeout = time::Duration::from_millis(env_to_uint("HTTP_TIMEOUT_MS", HTTP_TIMEOUT)?);

    let mut persistence = PersistenceConfig::default();
    if let Some(db_url) = env_opt(&lookup, "DB_URL") {
        persistence.db_url = db_url;
    }
    persistence.raw_store_root = env_opt(&lookup, "RAW_STORE_ROOT");
    persistence.raw_zstd_level = (env_to_uint("RAW_ZSTD_LEVEL", 3)?).min(21) as i32;

    let mut report = ReportConfig::default();
    if let Some(path) = env_opt(&lookup, "REPORT_PATH") {
        report.output_path = path;
    }
    if let Some(title) = env_opt(&lookup, "REPORT_TITLE") {
        report.title = title;
    }

    let concurrency = ConcurrencyConfig {
        label_workers: (env_to_uint("LABEL_WORKERS", LABEL_WORKERS as u64)? as usize).max(1),
        show_progress: env_to_bool("SHOW_PROGRESS", true),
    };

    let mut logging = LoggingConfig::default();
    if let Some(format) = env_opt(&lookup, "LOG_FORMAT") {
        logging.format = LogFormat::parse(&format)
            .ok_or_else(|| CrawlerError::Config(format!("LOG_FORMAT unknown: {format}")))?;
    }
    if logging.format == LogFormat::Pretty {
        logging.include_file_line = false;
    }

    Ok( AppConfig {
        identity, chart, http, persistence, report, concurrency, logging
    } )
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, CrawlerError> {
    dotenvy::dotenv().ok();
    build_config(|key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<AppConfig, CrawlerError> {
        let map: HashMap<String, String> = pairs.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        build_config(move |k| map.get(k).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let cfg = from_pairs(&[]).unwrap();
        assert_eq!(cfg.chart.chart_urls, vec![DEFAULT_CHART_URL.to_string()]);
        assert_eq!(cfg.chart.site_base.as_str(), DEFAULT_SITE_BASE);
        assert_eq!(cfg.identity.user_agent, "Mozilla/5.0");
        assert_eq!(cfg.concurrency.label_workers, 10);
        assert_eq!(cfg.http.timeout, time::Duration::from_secs(10));
        assert_eq!(cfg.report.output_path, "index.html");
        assert!(cfg.persistence.raw_store_root.is_none());
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn chart_url_list_is_split_on_whitespace() {
        let cfg = from_pairs(&[(
            "CHART_URLS",
            "  https://www.beatport.com/chart/a/1\n  https://www.beatport.com/chart/b/2 "
        )]).unwrap();
        assert_eq!(cfg.chart.chart_urls, vec![
            "https://www.beatport.com/chart/a/1".to_string(),
            "https://www.beatport.com/chart/b/2".to_string(),
        ]);
    }

    #[test]
    fn single_chart_url_keeps_commas() {
        let url = "https://www.beatport.com/chart/a/1?genres=5,12&page=1";
        let cfg = from_pairs(&[("CHART_URL", url)]).unwrap();
        assert_eq!(cfg.chart.chart_urls, vec![url.to_string()]);

        // the list wins over the single url
        let cfg = from_pairs(&[
            ("CHART_URL", url),
            ("CHART_URLS", "https://www.beatport.com/chart/b/2"),
        ]).unwrap();
        assert_eq!(cfg.chart.chart_urls, vec!["https://www.beatport.com/chart/b/2".to_string()]);
    }

    #[test]
    fn rejects_unfetchable_chart_url() {
        assert!(matches!(
            from_pairs(&[("CHART_URL", "not a url")]),
            Err(CrawlerError::Config(_))
        ));
        assert!(matches!(
            from_pairs(&[("CHART_URL", "ftp://example.com/chart/x/1")]),
            Err(CrawlerError::Config(_))
        ));
    }

    #[test]
    fn site_base_gains_trailing_slash() {
        let cfg = from_pairs(&[("SITE_BASE_URL", "https://example.com/shop")]).unwrap();
        assert_eq!(cfg.chart.site_base.as_str(), "https://example.com/shop/");
    }

    #[test]
    fn numeric_and_flag_overrides() {
        let cfg = from_pairs(&[
            ("LABEL_WORKERS", "0"),
            ("HTTP_TIMEOUT_MS", "2500"),
            ("RAW_ZSTD_LEVEL", "99"),
            ("SHOW_PROGRESS", "0"),
            ("LOG_FORMAT", "Pretty"),
        ]).unwrap();
        assert_eq!(cfg.concurrency.label_workers, 1);
        assert_eq!(cfg.http.timeout, time::Duration::from_millis(2500));
        assert_eq!(cfg.persistence.raw_zstd_level, 21);
        assert!(!cfg.concurrency.show_progress);
        assert_eq!(cfg.logging.format, LogFormat::Pretty);

        assert!(from_pairs(&[("LABEL_WORKERS", "ten")]).is_err());
        assert!(from_pairs(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
