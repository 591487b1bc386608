//! # Error Types
//!
//! Errors raised inside the snapshot pipeline.
//!
//! We use `thiserror` to generate the `Error` implementations. None of these
//! errors ever reach the instrumented application: the host-facing entry points
//! on [`Agent`](crate::Agent) log them and answer with a `bool` instead.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for pipeline operations
///
/// ## Error Categories
///
/// 1. **Delivery errors**: Sink (the destination rejected or could not take the payload)
/// 2. **Encoding errors**: Serialize, Decode (payload bytes could not be produced or read back)
/// 3. **Configuration errors**: Config
/// 4. **I/O errors**: Io
#[derive(Error, Debug)]
pub enum LogsnapError
{
    /// A delivery sink failed to write a payload
    #[error("Delivery failed: {0}")]
    Sink(#[from] SinkError),

    /// The envelope could not be serialized
    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A payload could not be decoded back into an envelope
    #[error("Failed to decode payload: {0}")]
    Decode(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error outside of a sink (reading captures, config files, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a [`DeliverySink`](crate::sink::DeliverySink)
#[derive(Error, Debug)]
pub enum SinkError
{
    /// The target directory is missing, not a directory, or read-only
    ///
    /// Checked before anything is written so that a misconfigured agent never
    /// leaves partial files behind.
    #[error("Directory is not writable: {}", .0.display())]
    NotWritable(PathBuf),

    /// Writing the payload failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP endpoint rejected the payload or could not be reached
    #[error("HTTP delivery to {url} failed: {reason}")]
    Http
    {
        /// Endpoint the payload was posted to
        url: String,
        /// Transport or status error
        reason: String,
    },

    /// The receiving end of a channel sink is gone
    #[error("Channel receiver disconnected")]
    Disconnected,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError
{
    /// The configuration file could not be parsed
    #[error("Invalid configuration file {}: {reason}", path.display())]
    Parse
    {
        /// File that failed to parse
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// An environment variable holds a value that cannot be used
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv
    {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
    },
}

/// Convenience type alias for `Result<T, LogsnapError>`
///
/// ```rust
/// use logsnap_core::error::LogsnapResult;
/// fn foo() -> LogsnapResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type LogsnapResult<T> = std::result::Result<T, LogsnapError>;
