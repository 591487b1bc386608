//! # Logging Utilities
//!
//! Logging infrastructure for logsnap using `tracing`.
//!
//! Two entry points matter:
//!
//! - [`init_logging`]: console logging for the `logsnap` CLI, optionally teed to
//!   a file.
//! - [`init_logging_for_agent`]: file-only logging for an agent embedded in an
//!   instrumented application. The host owns stdout/stderr, so nothing is ever
//!   written there.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use logsnap_utils::init_logging;
//!
//! let _guard = init_logging().expect("Failed to initialize logging");
//! tracing::info!("Replay started");
//! ```
//!
//! File output goes through a background writer. Keep the returned
//! [`LoggingGuard`] alive until the process is done logging: dropping it
//! flushes every queued line.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: level filter (e.g. `RUST_LOG=debug`, `RUST_LOG=logsnap_core=trace`)
//! - `LOGSNAP_LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
//! - `LOGSNAP_LOG_FILE`: log file path. Optional for the CLI; for the agent it
//!   overrides the default `~/.logsnap/<date>-agent.log`.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const FORMAT_ENV: &str = "LOGSNAP_LOG_FORMAT";
/// Environment variable selecting the log file.
pub const FILE_ENV: &str = "LOGSNAP_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Keeps background log writers running; flushes them when dropped.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard
{
    writers: Vec<WorkerGuard>,
}

impl LoggingGuard
{
    /// Whether any file output is attached.
    #[must_use]
    pub fn has_file_output(&self) -> bool
    {
        !self.writers.is_empty()
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default)
    Pretty,
    /// One JSON object per line, for log shippers
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Initialize console logging from the environment.
///
/// Reads `LOGSNAP_LOG_FORMAT`, `RUST_LOG` and `LOGSNAP_LOG_FILE`. Console output
/// goes to stderr so that command output on stdout stays machine readable.
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed or the log
/// file cannot be opened.
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = env::var(FORMAT_ENV)
        .ok()
        .and_then(|s| LogFormat::from_str(&s).ok())
        .unwrap_or(LogFormat::Pretty);

    init_console(format, None)
}

/// Initialize console logging with an explicit level and format.
///
/// `RUST_LOG` is ignored; `LOGSNAP_LOG_FILE` is still honoured.
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    init_console(format, Some(level.into()))
}

/// Initialize file-only logging for an agent running inside a host process.
///
/// The file is `LOGSNAP_LOG_FILE` when set, otherwise
/// `~/.logsnap/YYYY-MM-DD-agent.log`, falling back to the system temp
/// directory when there is no home directory. Returns the path in use and the
/// guard that flushes the file on drop.
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the directory cannot
/// be created.
pub fn init_logging_for_agent(level: Option<LogLevel>) -> Result<(PathBuf, LoggingGuard), LoggingError>
{
    let log_file = match env::var(FILE_ENV) {
        Ok(path) => PathBuf::from(path),
        Err(_) => default_agent_log_file()?,
    };

    let format = env::var(FORMAT_ENV)
        .ok()
        .and_then(|s| LogFormat::from_str(&s).ok())
        .unwrap_or(LogFormat::Json);

    let filter = build_filter(level.map(Into::into));
    let (layer, writer) = file_layer(format, filter, &log_file)?;
    install(vec![layer])?;

    Ok((log_file, LoggingGuard { writers: vec![writer] }))
}

fn default_agent_log_file() -> Result<PathBuf, LoggingError>
{
    let today = Utc::now().format("%Y-%m-%d");
    let dir = match env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".logsnap"),
        Err(_) => env::temp_dir(),
    };
    std::fs::create_dir_all(&dir).map_err(LoggingError::FileError)?;
    Ok(dir.join(format!("{today}-agent.log")))
}

fn init_console(format: LogFormat, explicit_level: Option<Level>) -> Result<LoggingGuard, LoggingError>
{
    let filter = build_filter(explicit_level);
    let mut layers = vec![console_layer(format, filter.clone())];
    let mut guard = LoggingGuard::default();

    if let Ok(path) = env::var(FILE_ENV) {
        let (layer, writer) = file_layer(format, filter, Path::new(&path))?;
        layers.push(layer);
        guard.writers.push(writer);
    }

    install(layers)?;
    Ok(guard)
}

/// Filter priority: explicit level, then `RUST_LOG`, then INFO.
fn build_filter(explicit_level: Option<Level>) -> EnvFilter
{
    if let Some(level) = explicit_level {
        return EnvFilter::new(level.to_string());
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))
}

fn console_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(true)
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, filter: EnvFilter, log_file: &Path) -> Result<(BoxedLayer, WorkerGuard), LoggingError>
{
    let dir = log_file.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = log_file
        .file_name()
        .ok_or_else(|| LoggingError::InitializationFailed(format!("not a file path: {}", log_file.display())))?;
    std::fs::create_dir_all(dir)?;

    // The date is already part of agent log names, so never roll.
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    };

    Ok((layer, guard))
}

fn install(layers: Vec<BoxedLayer>) -> Result<(), LoggingError>
{
    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Unknown log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Unknown log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// A global subscriber is already installed, or the layer stack was rejected
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
