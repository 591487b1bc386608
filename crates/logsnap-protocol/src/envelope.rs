//! Event envelope wrapped around every delivered payload.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::{ErrorRecord, Snapshot};

/// Event name of a snapshot payload.
pub const DEBUG_EVENT: &str = "debug-event";
/// Event name of an evaluation error payload.
pub const ERROR_EVENT: &str = "logpoint-error-evaluating";

/// Identifier of a logpoint as assigned by whoever configured it.
///
/// Hosts hand these in either as integers or as opaque strings; both are kept
/// verbatim on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogpointId
{
    /// Numeric identifier.
    Number(u64),
    /// Opaque textual identifier.
    Text(String),
}

impl fmt::Display for LogpointId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<u64> for LogpointId
{
    fn from(id: u64) -> Self
    {
        Self::Number(id)
    }
}

impl From<&str> for LogpointId
{
    fn from(id: &str) -> Self
    {
        Self::Text(id.to_string())
    }
}

impl From<String> for LogpointId
{
    fn from(id: String) -> Self
    {
        Self::Text(id)
    }
}

/// Routing identifiers carried next to the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header
{
    /// Project the instrumented application belongs to. Omitted when unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    /// Logpoint the payload is about (error events only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logpoint_id: Option<LogpointId>,
}

impl Header
{
    /// Header for a project, treating `0` as "no project".
    #[must_use]
    pub fn for_project(project_id: u64) -> Self
    {
        Self {
            project_id: (project_id != 0).then_some(project_id),
            logpoint_id: None,
        }
    }

    /// Attach a logpoint identifier.
    #[must_use]
    pub fn with_logpoint(mut self, logpoint_id: LogpointId) -> Self
    {
        self.logpoint_id = Some(logpoint_id);
        self
    }
}

/// A complete payload as handed to a delivery sink.
///
/// The `event` field selects the shape of `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Envelope
{
    /// Snapshot of every frame captured during one request.
    #[serde(rename = "debug-event")]
    Debug
    {
        /// Routing identifiers.
        header: Header,
        /// The snapshot.
        data: Snapshot,
    },
    /// A logpoint failed to evaluate.
    #[serde(rename = "logpoint-error-evaluating")]
    EvaluationError
    {
        /// Routing identifiers, including the logpoint id.
        header: Header,
        /// The error.
        data: ErrorRecord,
    },
}

impl Envelope
{
    /// Wire name of the event.
    #[must_use]
    pub fn event(&self) -> &'static str
    {
        match self {
            Self::Debug { .. } => DEBUG_EVENT,
            Self::EvaluationError { .. } => ERROR_EVENT,
        }
    }

    /// Routing header.
    #[must_use]
    pub fn header(&self) -> &Header
    {
        match self {
            Self::Debug { header, .. } | Self::EvaluationError { header, .. } => header,
        }
    }

    /// Compact JSON encoding. Newlines inside strings are escaped, so the output
    /// is always a single line. Non-finite floats are written as `null`.
    ///
    /// ## Errors
    ///
    /// Returns the `serde_json` error if serialization fails; the envelope types
    /// have no fallible fields, so this does not happen in practice.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>>
    {
        serde_json::to_vec(self)
    }

    /// Decode a payload produced by [`Envelope::to_json`].
    ///
    /// ## Errors
    ///
    /// Returns the underlying `serde_json` error for malformed input.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self>
    {
        serde_json::from_slice(bytes)
    }
}
