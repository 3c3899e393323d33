//!
//! src/logging.rs  Andrew Belles  Sept 13th, 2025
//!
//! Initializes logger, includes methods for calling logger
//! and ensuring that crawler gives informative outputs while running
//!
//!

use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};
use tracing_error::ErrorLayer;
use tracing_appender::non_blocking;

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::CrawlerError;

/// Keeps the non-blocking writer flushing until main returns
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard
}

pub fn init_logging(cfg: &LoggingConfig) -> Result<LoggingGuard, CrawlerError> {
    let (writer, guard) = non_blocking(std::io::stdout());
    let filter = std::env::var("RUST_LOG")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(cfg.filter_directives.clone()));

    let time = tracing_subscriber::fmt::time::UtcTime::rfc_3339();
    let base = fmt::layer()
        .with_writer(writer)
        .with_timer(time)
        .with_ansi(cfg.with_ansi)
        .with_target(cfg.include_target)
        .with_file(cfg.include_file_line)
        .with_line_number(cfg.include_file_line);

    let fmt_layer = match cfg.format {
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| CrawlerError::Config(format!("logger already set: {e}")))?;

    Ok( LoggingGuard { _guard: guard } )
}
