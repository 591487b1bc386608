//! # logsnap utilities
//!
//! Logging setup shared by the agent library and the `logsnap` CLI.
//!
//! The agent runs inside someone else's request, so it has two modes: the CLI
//! logs to the console, while an embedded agent logs to a file only and never
//! writes to the host's stdout.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{LogFormat, LogLevel, LoggingError, LoggingGuard, init_logging, init_logging_for_agent, init_logging_with_level};
pub use tracing::{debug, error, info, trace, warn};
