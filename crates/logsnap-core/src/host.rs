//! # Host capabilities
//!
//! What the pipeline needs to ask the instrumented runtime, beyond the data it
//! receives with each callback: the global state (read once per request), and
//! which logpoint is being evaluated when the runtime raises a warning.

use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use logsnap_protocol::{LogpointId, SnapshotInfo};

use crate::value::Bindings;

/// Placeholder for request metadata the host did not provide.
pub const UNKNOWN: &str = "(unknown)";

/// Metadata of the request a session belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo
{
    /// When the request started.
    pub request_time: Option<DateTime<Utc>>,
    /// Request URI.
    pub uri: Option<String>,
    /// Requested host.
    pub host: Option<String>,
    /// Client address.
    pub client_ip: Option<String>,
}

impl RequestInfo
{
    /// Wire form, with placeholders for missing fields.
    #[must_use]
    pub fn snapshot_info(&self) -> SnapshotInfo
    {
        let or_unknown = |field: &Option<String>| field.clone().unwrap_or_else(|| UNKNOWN.to_string());

        SnapshotInfo {
            request_time: self
                .request_time
                .map_or_else(|| UNKNOWN.to_string(), |t| t.format("%H:%M:%S").to_string()),
            request_uri: or_unknown(&self.uri),
            host: or_unknown(&self.host),
            client_ip: or_unknown(&self.client_ip),
        }
    }
}

/// A logpoint as identified by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointInfo
{
    /// Logpoint identifier.
    pub id: LogpointId,
    /// File the logpoint is set in.
    pub file: Option<String>,
    /// Line the logpoint is set on.
    pub line: Option<u32>,
}

impl BreakpointInfo
{
    /// Logpoint with a known location.
    pub fn new(id: impl Into<LogpointId>, file: impl Into<String>, line: u32) -> Self
    {
        Self {
            id: id.into(),
            file: Some(file.into()),
            line: Some(line),
        }
    }
}

/// State the pipeline reads from the instrumented runtime.
pub trait HostState
{
    /// Global variables of the request.
    fn globals(&self) -> Bindings;

    /// User-defined constants.
    fn user_constants(&self) -> Bindings;

    /// Logpoint currently being evaluated, if any.
    fn current_breakpoint(&self) -> Option<BreakpointInfo>
    {
        None
    }
}

impl<T: HostState + ?Sized> HostState for Rc<T>
{
    fn globals(&self) -> Bindings
    {
        (**self).globals()
    }

    fn user_constants(&self) -> Bindings
    {
        (**self).user_constants()
    }

    fn current_breakpoint(&self) -> Option<BreakpointInfo>
    {
        (**self).current_breakpoint()
    }
}

impl<T: HostState + ?Sized> HostState for Arc<T>
{
    fn globals(&self) -> Bindings
    {
        (**self).globals()
    }

    fn user_constants(&self) -> Bindings
    {
        (**self).user_constants()
    }

    fn current_breakpoint(&self) -> Option<BreakpointInfo>
    {
        (**self).current_breakpoint()
    }
}

/// Host state captured up front, for replays and tests.
#[derive(Debug, Default)]
pub struct StaticHost
{
    globals: Bindings,
    constants: Bindings,
    evaluating: Mutex<Option<BreakpointInfo>>,
}

impl StaticHost
{
    /// Host with the given globals and constants.
    #[must_use]
    pub fn new(globals: Bindings, constants: Bindings) -> Self
    {
        Self {
            globals,
            constants,
            evaluating: Mutex::new(None),
        }
    }

    /// Set (or clear) the logpoint being evaluated.
    pub fn set_evaluating(&self, breakpoint: Option<BreakpointInfo>)
    {
        *self.evaluating.lock().unwrap_or_else(PoisonError::into_inner) = breakpoint;
    }
}

impl HostState for StaticHost
{
    fn globals(&self) -> Bindings
    {
        self.globals.clone()
    }

    fn user_constants(&self) -> Bindings
    {
        self.constants.clone()
    }

    fn current_breakpoint(&self) -> Option<BreakpointInfo>
    {
        self.evaluating.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
