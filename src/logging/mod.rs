//! Logging infrastructure - structured tracing for the object model
//!
//! Design: Uses `tracing` with one target per subsystem:
//! - `allocator`: allocations and frees (trace)
//! - `object`: construction, rollback, leaks
//! - `control_block`: attach, destroy, block release
//! - `blob`: blob factories
//!
//! Output goes through a non-blocking writer to stdout, stderr or a daily
//! rolling file, formatted pretty, compact or as JSON.

use crate::allocator::DebugInfo;
use crate::config::{LogFormatSetting, LoggingConfig};
use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    filter::Directive,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub use tracing::{debug, error, info, trace, warn};

/// Set once the global subscriber is installed; holds the writer guard
static LOGGER: OnceCell<Option<WorkerGuard>> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-line
    Pretty,
    /// Single line per event
    Compact,
    /// Structured JSON
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily rotated files `<directory>/<prefix>.<date>`
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span open/close events
    pub span_events: bool,
    /// Extra filter directives (e.g. "donut_object::object=trace")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

fn parse_level(text: &str) -> Level {
    match text.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Build from the `[logging]` section of the configuration file
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        let format = match settings.format {
            LogFormatSetting::Pretty => LogFormat::Pretty,
            LogFormatSetting::Compact => LogFormat::Compact,
            LogFormatSetting::Json => LogFormat::Json,
        };
        let output = match &settings.directory {
            Some(directory) => LogOutput::File {
                directory: directory.clone(),
                prefix: settings.prefix.clone(),
            },
            None => LogOutput::Stderr,
        };

        Self {
            level: parse_level(&settings.level),
            format,
            output,
            span_events: settings.span_events,
            filter: settings.filter.clone(),
        }
    }

    /// Apply environment overrides on top of `self`
    pub fn with_env(mut self) -> Self {
        // DONUT_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("DONUT_LOG_LEVEL") {
            self.level = parse_level(&level);
        }

        // DONUT_LOG_FILE: directory for daily rolling log files
        if let Ok(directory) = std::env::var("DONUT_LOG_FILE") {
            self.output = LogOutput::File { directory, prefix: "donut".to_string() };
        }

        // DONUT_LOG_JSON: JSON output
        if std::env::var("DONUT_LOG_JSON").is_ok() {
            self.format = LogFormat::Json;
        }

        // DONUT_LOG_SPANS: span events
        if std::env::var("DONUT_LOG_SPANS").is_ok() {
            self.span_events = true;
        }

        self
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env()
    }
}

/// Initialize logging from environment variables
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize the global logging system
///
/// Idempotent: only the first call installs a subscriber. Also returns
/// quietly if another subscriber was installed outside this crate.
pub fn init_with_config(config: LogConfig) {
    LOGGER.get_or_init(|| install(config));
}

fn install(config: LogConfig) -> Option<WorkerGuard> {
    let filter = build_filter(&config);
    let spans = span_events_config(config.span_events);

    let (writer, guard) = match &config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File { directory, prefix } => {
            tracing_appender::non_blocking(rolling::daily(directory, prefix))
        }
    };

    let installed = match config.format {
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_writer(writer)
                .pretty()
                .with_span_events(spans)
                .with_filter(filter);

            tracing_subscriber::registry().with(layer).try_init()
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .with_writer(writer)
                .compact()
                .with_span_events(spans)
                .with_filter(filter);

            tracing_subscriber::registry().with(layer).try_init()
        }
        LogFormat::Json => {
            let layer = fmt::layer()
                .with_writer(writer)
                .json()
                .with_span_events(spans)
                .with_filter(filter);

            tracing_subscriber::registry().with(layer).try_init()
        }
    };

    installed.ok().map(|_| guard)
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let level = config.level.as_str().to_lowercase();
    let base_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("donut_object={}", level)));

    match &config.filter {
        Some(filter_str) => filter_str
            .split(',')
            .map(str::trim)
            .filter(|directive| !directive.is_empty())
            .fold(base_filter, |filter, directive| match directive.parse::<Directive>() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => {
                    warn!("Invalid filter directive: {}", directive);
                    filter
                }
            }),
        None => base_filter,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER.get().is_some()
}

// ============================================================================
// Object-model events
// ============================================================================

/// Log memory allocation
#[inline]
pub fn log_allocation(size: usize, ptr: *const u8, info: &DebugInfo) {
    trace!(
        target: "allocator",
        event = "allocation",
        size_bytes = size,
        address = ?ptr,
        description = info.description,
        "Memory allocated"
    );
}

/// Log memory deallocation
#[inline]
pub fn log_deallocation(size: usize, ptr: *const u8) {
    trace!(
        target: "allocator",
        event = "deallocation",
        size_bytes = size,
        address = ?ptr,
        "Memory deallocated"
    );
}

/// Log library initialization
pub fn log_init() {
    info!(target: "object", event = "init", "Object model initializing");
}

/// Log library shutdown with the objects still alive
pub fn log_shutdown(alive: usize, blocks_freed: usize) {
    if alive > 0 {
        warn!(
            target: "object",
            event = "shutdown",
            alive_objects = alive,
            blocks_freed = blocks_freed,
            "Object model shutting down with live objects"
        );
    } else {
        info!(
            target: "object",
            event = "shutdown",
            blocks_freed = blocks_freed,
            "Object model shutting down"
        );
    }
}
