//! Logging setup over `tracing-subscriber`.
//!
//! Each dispatch runs inside a DEBUG-level `dispatch` span carrying
//! `platform` and `sender_id`. [`LoggingBuilder::trace_dispatches`] turns
//! that span on and logs one line when it opens and one, with timings,
//! when it closes.
//!
//! Filters are layered: `RUST_LOG` when set, otherwise the base level, then
//! the level shared by the `parley_*` crates, then explicit directives.
//!
//! ```rust,ignore
//! use parley_runtime::{config::load_config, logging};
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//!
//! // or by hand
//! logging::LoggingBuilder::new()
//!     .parley_level(tracing::Level::DEBUG)
//!     .trace_dispatches()
//!     .init();
//! ```

use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

/// Targets of the crates that make up Parley.
pub const PARLEY_TARGETS: &[&str] = &[
    "parley_core",
    "parley_framework",
    "parley_runtime",
    "parley_adapter_web",
];

/// Log file used when file output is selected without a path.
pub const DEFAULT_LOG_FILE: &str = "parley.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initializes logging from a [`LoggingConfig`].
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Maps configured span events onto the formatter's flags.
pub fn span_events(config: &SpanEventConfig) -> FmtSpan {
    [
        (config.new, FmtSpan::NEW),
        (config.enter, FmtSpan::ENTER),
        (config.exit, FmtSpan::EXIT),
        (config.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .fold(FmtSpan::NONE, |acc, (_, flag)| acc | flag)
}

/// A builder for the global tracing subscriber.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: Level,
    parley_level: Option<Level>,
    directives: Vec<String>,
    span_events: FmtSpan,
    format: LogFormat,
    output: LogOutput,
    with_target: bool,
    thread_ids: bool,
    file_location: bool,
    file_path: Option<PathBuf>,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            level: Level::INFO,
            parley_level: None,
            directives: Vec::new(),
            span_events: FmtSpan::NONE,
            format: LogFormat::default(),
            output: LogOutput::default(),
            with_target: true,
            thread_ids: false,
            file_location: false,
            file_path: None,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));

        Self {
            level: config.level.to_tracing_level(),
            directives: filters
                .into_iter()
                .map(|(target, level)| format!("{target}={level}"))
                .collect(),
            span_events: span_events(&config.span_events),
            format: config.format,
            output: config.output,
            thread_ids: config.thread_ids,
            file_location: config.file_location,
            file_path: config.file_path.clone(),
            ..Self::new()
        }
    }

    /// Sets the level for everything not matched by a narrower filter.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets one level for every crate in [`PARLEY_TARGETS`].
    pub fn parley_level(mut self, level: Level) -> Self {
        self.parley_level = Some(level);
        self
    }

    /// Adds a filter directive such as `parley_framework::rules=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Logs the opening and closing of every `dispatch` span.
    ///
    /// The span is emitted at DEBUG, so this also lowers `parley_framework`
    /// to DEBUG unless a directive set it already.
    pub fn trace_dispatches(mut self) -> Self {
        self.span_events |= FmtSpan::NEW | FmtSpan::CLOSE;
        if !self
            .directives
            .iter()
            .any(|d| d.starts_with("parley_framework="))
        {
            self.directives.push("parley_framework=debug".into());
        }
        self
    }

    pub fn span_events(mut self, events: FmtSpan) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// The filter directives in the order they are applied.
    fn filter_directives(&self) -> Vec<String> {
        let mut directives = vec![self.level.to_string().to_lowercase()];
        if let Some(level) = self.parley_level {
            let level = level.to_string().to_lowercase();
            directives.extend(PARLEY_TARGETS.iter().map(|target| format!("{target}={level}")));
        }
        directives.extend(self.directives.iter().cloned());
        directives
    }

    fn build_filter(&self) -> EnvFilter {
        let mut directives = self.filter_directives().into_iter();
        let base = directives.next().unwrap_or_default();
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));
        directives
            .filter_map(|directive| directive.parse().ok())
            .fold(filter, EnvFilter::add_directive)
    }

    fn log_file(&self) -> &Path {
        self.file_path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_LOG_FILE))
    }

    fn writer(&self) -> BoxMakeWriter {
        match self.output {
            LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogOutput::File => {
                let path = self.log_file();
                let dir = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let name = path
                    .file_name()
                    .map_or_else(|| DEFAULT_LOG_FILE.into(), |name| name.to_os_string());
                BoxMakeWriter::new(tracing_appender::rolling::never(dir, name))
            }
        }
    }

    fn fmt_layer(&self) -> BoxedLayer {
        let layer = fmt::layer()
            .with_writer(self.writer())
            .with_span_events(self.span_events.clone())
            .with_target(self.with_target)
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_location)
            .with_line_number(self.file_location);

        match self.format {
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            // Without `json-log`, JSON falls back to the full layout.
            _ => layer.boxed(),
        }
    }

    pub fn init(self) {
        let _ = self.try_init();
    }

    pub fn try_init(self) -> Result<(), TryInitError> {
        tracing_subscriber::registry()
            .with(self.fmt_layer())
            .with(self.build_filter())
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Debug,
            thread_ids: true,
            span_events: SpanEventConfig {
                new: true,
                close: true,
                ..Default::default()
            },
            ..Default::default()
        };
        config.filters.insert("parley_runtime".into(), LogLevel::Trace);
        config.filters.insert("parley_framework".into(), LogLevel::Warn);

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, Level::DEBUG);
        assert_eq!(builder.span_events, FmtSpan::NEW | FmtSpan::CLOSE);
        assert!(builder.thread_ids);
        assert_eq!(
            builder.filter_directives(),
            vec!["debug", "parley_framework=warn", "parley_runtime=trace"]
        );
    }

    #[test]
    fn test_parley_level_covers_every_crate() {
        let builder = LoggingBuilder::new()
            .with_level(Level::WARN)
            .parley_level(Level::TRACE)
            .directive("parley_runtime::storage=info");

        assert_eq!(
            builder.filter_directives(),
            vec![
                "warn",
                "parley_core=trace",
                "parley_framework=trace",
                "parley_runtime=trace",
                "parley_adapter_web=trace",
                "parley_runtime::storage=info",
            ]
        );
    }

    #[test]
    fn test_trace_dispatches() {
        let builder = LoggingBuilder::new().trace_dispatches();
        assert_eq!(builder.span_events, FmtSpan::NEW | FmtSpan::CLOSE);
        assert_eq!(builder.filter_directives(), vec!["info", "parley_framework=debug"]);

        let builder = LoggingBuilder::new()
            .directive("parley_framework=trace")
            .trace_dispatches();
        assert_eq!(builder.filter_directives(), vec!["info", "parley_framework=trace"]);
    }

    #[test]
    fn test_span_events_from_config() {
        assert_eq!(span_events(&SpanEventConfig::default()), FmtSpan::NONE);
        let all = SpanEventConfig {
            new: true,
            enter: true,
            exit: true,
            close: true,
        };
        assert_eq!(span_events(&all), FmtSpan::FULL);
    }

    #[test]
    fn test_log_file_defaults_to_parley_log() {
        let builder = LoggingBuilder::new().output(LogOutput::File);
        assert_eq!(builder.log_file(), Path::new(DEFAULT_LOG_FILE));

        let builder = builder.file_path("/var/log/bot/support.log");
        assert_eq!(builder.log_file(), Path::new("/var/log/bot/support.log"));
    }
}
