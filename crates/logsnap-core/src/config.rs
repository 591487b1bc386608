//! # Configuration
//!
//! [`AgentConfig`] gathers every knob of the pipeline. It is read from an
//! optional TOML file and then overlaid with environment variables, which is
//! how the extension's INI settings reach the agent:
//!
//! | Variable                | Effect                                          |
//! |-------------------------|-------------------------------------------------|
//! | `LOGSNAP_DIRECTORY`     | deliver into `<dir>/logs`                       |
//! | `LOGSNAP_HTTP_ENDPOINT` | deliver by HTTP POST (wins over the directory)  |
//! | `LOGSNAP_ROOT`          | strip this root from source paths               |
//! | `LOGSNAP_FILE_PREFIX`   | prefix of delivery names                        |
//! | `LOGSNAP_ENCODING`      | `json` or `deflate_base64`                      |
//!
//! Empty variables are ignored.
//!
//! ## Example
//!
//! ```toml
//! file_prefix = "shop"
//! empty_snapshot = "skip"
//!
//! [render]
//! max_depth = 2
//!
//! [sink]
//! kind = "http"
//! url = "http://collector:8080/ingest"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigError, LogsnapResult};
use crate::frame::FrameOptions;
use crate::path::PathNormalizer;
use crate::render::RenderBounds;
use crate::session::EmptySnapshotPolicy;
use crate::sink::{DeliverySink, DirectorySink, DiscardSink, HttpSink, PayloadEncoding};
use crate::stack::StackOptions;
use crate::vars::RESERVED_LOCALS;

/// Environment variable naming the agent directory.
pub const DIRECTORY_ENV: &str = "LOGSNAP_DIRECTORY";
/// Environment variable naming an HTTP collector.
pub const HTTP_ENDPOINT_ENV: &str = "LOGSNAP_HTTP_ENDPOINT";
/// Environment variable naming the project root.
pub const ROOT_ENV: &str = "LOGSNAP_ROOT";
/// Environment variable overriding the delivery name prefix.
pub const FILE_PREFIX_ENV: &str = "LOGSNAP_FILE_PREFIX";
/// Environment variable selecting the payload encoding.
pub const ENCODING_ENV: &str = "LOGSNAP_ENCODING";

/// Default delivery name prefix.
pub const DEFAULT_FILE_PREFIX: &str = "logsnap";
/// Default HTTP timeout in milliseconds.
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 2_000;
/// Subdirectory of the agent directory payloads are written to.
pub const LOGS_SUBDIR: &str = "logs";

/// Where payloads go.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig
{
    /// One file per payload.
    Directory
    {
        /// Target directory.
        path: PathBuf,
    },
    /// One POST per payload.
    Http
    {
        /// Collector endpoint.
        url: String,
        /// Request timeout.
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    /// Delivery switched off.
    Disabled,
}

fn default_timeout_ms() -> u64
{
    DEFAULT_HTTP_TIMEOUT_MS
}

impl Default for SinkConfig
{
    fn default() -> Self
    {
        Self::Directory {
            path: std::env::temp_dir().join(DEFAULT_FILE_PREFIX).join(LOGS_SUBDIR),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AgentConfig
{
    /// Value rendering limits.
    pub render: RenderBounds,
    /// Call descriptor options.
    pub stack: StackOptions,
    /// Rewrite source paths relative to the project root.
    pub strip_root: bool,
    /// Project root; the working directory when unset.
    pub root: Option<PathBuf>,
    /// Header of the watched-value group.
    pub watch_label: Option<String>,
    /// Locals never rendered.
    pub reserved_names: Vec<String>,
    /// Handling of sessions without frames.
    pub empty_snapshot: EmptySnapshotPolicy,
    /// Prefix of delivery names.
    pub file_prefix: String,
    /// Payload encoding.
    pub encoding: PayloadEncoding,
    /// Delivery destination.
    pub sink: SinkConfig,
}

impl Default for AgentConfig
{
    fn default() -> Self
    {
        Self {
            render: RenderBounds::default(),
            stack: StackOptions::default(),
            strip_root: true,
            root: None,
            watch_label: None,
            reserved_names: RESERVED_LOCALS.iter().map(ToString::to_string).collect(),
            empty_snapshot: EmptySnapshotPolicy::default(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            encoding: PayloadEncoding::default(),
            sink: SinkConfig::default(),
        }
    }
}

impl AgentConfig
{
    /// Read a TOML file, or the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> LogsnapResult<Self>
    {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Defaults overlaid with the process environment.
    ///
    /// # Errors
    ///
    /// Fails when an environment variable holds an unusable value.
    pub fn from_env() -> LogsnapResult<Self>
    {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay the process environment.
    ///
    /// # Errors
    ///
    /// See [`apply_env_with`](Self::apply_env_with).
    pub fn apply_env(&mut self) -> Result<(), ConfigError>
    {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Overlay variables read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] for an unknown encoding.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError>
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var(DIRECTORY_ENV) {
            self.sink = SinkConfig::Directory {
                path: PathBuf::from(dir).join(LOGS_SUBDIR),
            };
        }
        if let Some(url) = var(HTTP_ENDPOINT_ENV) {
            self.sink = SinkConfig::Http {
                url,
                timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            };
        }
        if let Some(root) = var(ROOT_ENV) {
            self.root = Some(PathBuf::from(root));
            self.strip_root = true;
        }
        if let Some(prefix) = var(FILE_PREFIX_ENV) {
            self.file_prefix = prefix;
        }
        if let Some(encoding) = var(ENCODING_ENV) {
            self.encoding = encoding.parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENCODING_ENV,
                value: encoding,
            })?;
        }
        Ok(())
    }

    /// Path normalizer for this configuration.
    #[must_use]
    pub fn path_normalizer(&self) -> PathNormalizer
    {
        if !self.strip_root {
            return PathNormalizer::disabled();
        }
        match &self.root {
            Some(root) => PathNormalizer::new(root),
            None => PathNormalizer::from_current_dir(),
        }
    }

    /// Frame-building options for this configuration.
    #[must_use]
    pub fn frame_options(&self) -> FrameOptions
    {
        FrameOptions {
            watch_label: self.watch_label.clone(),
            reserved_names: self.reserved_names.clone(),
        }
    }

    /// Open the configured sink.
    #[must_use]
    pub fn open_sink(&self) -> Arc<dyn DeliverySink>
    {
        match &self.sink {
            SinkConfig::Directory { path } => Arc::new(DirectorySink::new(path.clone())),
            SinkConfig::Http { url, timeout_ms } => Arc::new(HttpSink::new(url.clone(), Duration::from_millis(*timeout_ms))),
            SinkConfig::Disabled => Arc::new(DiscardSink),
        }
    }
}
