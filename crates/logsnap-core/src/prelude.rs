//! Common module for library exports

pub use crate::agent::Agent;
pub use crate::clock::{Clock, StepClock, SystemClock};
pub use crate::config::{AgentConfig, SinkConfig};
pub use crate::error::{LogsnapError, LogsnapResult};
pub use crate::frame::DebugCall;
pub use crate::host::{BreakpointInfo, HostState, RequestInfo, StaticHost};
pub use crate::render::{RenderBounds, Renderer};
pub use crate::sink::{ChannelSink, DeliverySink, DirectorySink, MemorySink, PayloadEncoding};
pub use crate::stack::RawTraceEntry;
pub use crate::value::{Bindings, Key, Value};
