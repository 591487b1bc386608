//! # logsnap-core
//!
//! Snapshot assembly and delivery for a logpoint debugging agent.
//!
//! The instrumenting extension calls into an [`Agent`] whenever a logpoint
//! fires. Each call becomes a [`Frame`](logsnap_protocol::Frame): the call
//! stack at that point, with the local variables (and, on the first frame of a
//! request, the global state) rendered into bounded text. Frames accumulate in
//! a per-request [`Session`] and leave the process as one payload when the
//! request ends.
//!
//! ## Pipeline
//!
//! ```text
//! DebugCall ──► FrameBuilder ──► Session ──► Dispatcher ──► DeliverySink
//!                 │  │                          ▲
//!                 │  └─ Renderer                │
//!                 └─ StackNormalizer    ErrorReporter (evaluation errors)
//! ```
//!
//! ## Failure model
//!
//! Capturing must never break the request being debugged. Rendering degrades
//! to placeholders, malformed traces get synthesized entries, and a payload
//! that cannot be delivered is logged and dropped.

pub mod agent;
pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod host;
pub mod path;
pub mod prelude;
pub mod render;
pub mod report;
pub mod session;
pub mod sink;
pub mod stack;
pub mod value;
pub mod vars;

pub use agent::Agent;
pub use config::{AgentConfig, SinkConfig};
pub use error::{ConfigError, LogsnapError, LogsnapResult, SinkError};
pub use frame::{DebugCall, FrameBuilder, FrameOptions};
pub use host::{BreakpointInfo, HostState, RequestInfo, StaticHost};
pub use report::{ErrorHandlerAdapter, ErrorReporter, EvaluationError};
pub use session::{EmptySnapshotPolicy, Session};
pub use sink::{DeliverySink, Dispatcher, PayloadEncoding};
pub use value::{Bindings, Value};
