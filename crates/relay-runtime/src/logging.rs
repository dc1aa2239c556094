//! Installs the global `tracing` subscriber described by [`LoggingConfig`].
//!
//! Every routed event runs inside a debug-level `dispatch` span that carries
//! the event kind and its post or webhook id. Turning on any
//! `logging.span_events` flag also enables that span, so `new` and `close`
//! lines show how long each event took to route even when the global level
//! is `info`.
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "compact"
//! span_events = { close = true }
//!
//! [logging.filters]
//! relay_runtime = "debug"
//! ```

use std::ffi::OsStr;
use std::path::Path;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig};

/// Target of the per-event `dispatch` span.
pub const DISPATCH_TARGET: &str = "relay_framework::dispatch";

/// Installs the subscriber. Does nothing if one is already set.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = try_init(config);
}

/// Installs the subscriber, failing if one is already set.
pub fn try_init(config: &LoggingConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(fmt_layer(config))
        .with(build_filter(config))
        .try_init()
}

/// `RUST_LOG` if set, else the configured level, plus [`directives`].
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    for directive in directives(config) {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }
    filter
}

/// Per-module filter directives, sorted by module so every start builds the
/// same filter. When span events are on and the level would hide the
/// `dispatch` span, a directive for it is appended.
pub fn directives(config: &LoggingConfig) -> Vec<String> {
    let mut filters: Vec<_> = config.filters.iter().collect();
    filters.sort_by(|a, b| a.0.cmp(b.0));
    let mut directives: Vec<String> = filters
        .into_iter()
        .map(|(module, level)| format!("{module}={}", level.as_str()))
        .collect();

    let hides_dispatch = matches!(config.level, LogLevel::Info | LogLevel::Warn | LogLevel::Error);
    if span_events(&config.span_events) != FmtSpan::NONE
        && hides_dispatch
        && !config.filters.contains_key(DISPATCH_TARGET)
    {
        directives.push(format!("{DISPATCH_TARGET}=debug"));
    }
    directives
}

fn span_events(config: &SpanEventConfig) -> FmtSpan {
    let mut span = FmtSpan::NONE;
    for (enabled, flag) in [
        (config.new, FmtSpan::NEW),
        (config.enter, FmtSpan::ENTER),
        (config.exit, FmtSpan::EXIT),
        (config.close, FmtSpan::CLOSE),
    ] {
        if enabled {
            span |= flag;
        }
    }
    span
}

fn fmt_layer(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer()
        .with_writer(make_writer(config))
        .with_ansi(config.output != LogOutput::File)
        .with_span_events(span_events(&config.span_events))
        .with_thread_ids(config.thread_ids)
        .with_file(config.file_location)
        .with_line_number(config.file_location);

    match config.format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Full => layer.boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        #[cfg(feature = "json-log")]
        LogFormat::Json => layer.json().boxed(),
    }
}

fn make_writer(config: &LoggingConfig) -> BoxMakeWriter {
    match (config.output, &config.file_path) {
        (LogOutput::Stdout, _) => BoxMakeWriter::new(std::io::stdout),
        (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
        (LogOutput::File, Some(path)) => BoxMakeWriter::new(tracing_appender::rolling::never(
            path.parent().unwrap_or_else(|| Path::new(".")),
            path.file_name().unwrap_or_else(|| OsStr::new("relay.log")),
        )),
        // Rejected by validation; only reachable with a hand-built config.
        (LogOutput::File, None) => BoxMakeWriter::new(std::io::stdout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: LogLevel, close: bool) -> LoggingConfig {
        LoggingConfig {
            level,
            span_events: SpanEventConfig {
                close,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_module_filters_are_sorted() {
        let mut config = config(LogLevel::Debug, false);
        config
            .filters
            .insert("relay_framework".into(), LogLevel::Trace);
        config.filters.insert("hyper".into(), LogLevel::Warn);

        assert_eq!(
            directives(&config),
            vec!["hyper=warn".to_owned(), "relay_framework=trace".to_owned()]
        );
    }

    #[test]
    fn test_span_events_enable_the_dispatch_span() {
        assert_eq!(
            directives(&config(LogLevel::Info, true)),
            vec!["relay_framework::dispatch=debug".to_owned()]
        );
        // Already visible, or span events off.
        assert!(directives(&config(LogLevel::Debug, true)).is_empty());
        assert!(directives(&config(LogLevel::Info, false)).is_empty());

        let mut explicit = config(LogLevel::Warn, true);
        explicit
            .filters
            .insert(DISPATCH_TARGET.into(), LogLevel::Trace);
        assert_eq!(
            directives(&explicit),
            vec!["relay_framework::dispatch=trace".to_owned()]
        );
    }

    #[test]
    fn test_span_event_flags() {
        assert_eq!(span_events(&SpanEventConfig::default()), FmtSpan::NONE);
        let lifecycle = SpanEventConfig {
            new: true,
            close: true,
            ..Default::default()
        };
        assert_eq!(span_events(&lifecycle), FmtSpan::NEW | FmtSpan::CLOSE);
        let all = SpanEventConfig {
            new: true,
            enter: true,
            exit: true,
            close: true,
        };
        assert_eq!(span_events(&all), FmtSpan::FULL);
    }
}
