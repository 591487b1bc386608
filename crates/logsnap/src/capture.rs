//! Recorded requests for `logsnap replay`.
//!
//! A capture is a JSON document holding what the extension would hand the
//! agent during one request:
//!
//! ```json
//! {
//!   "request": { "request_time": "2024-05-01T12:00:00Z", "uri": "/cart" },
//!   "globals": { "_SERVER": { "REQUEST_METHOD": "GET" } },
//!   "constants": { "APP_ENV": "dev" },
//!   "calls": [
//!     {
//!       "file": "/srv/app/cart.php",
//!       "line": 42,
//!       "locals": { "total": 12.5 },
//!       "trace": [{ "function": "total", "class": "Cart", "type": "->", "file": "/srv/app/cart.php", "line": 42 }]
//!     }
//!   ],
//!   "errors": [{ "logpoint_id": 7, "file": "/srv/app/cart.php", "line": 50, "message": "Undefined variable $tax" }]
//! }
//! ```
//!
//! Values use the JSON form understood by [`Value`]'s conversion, including
//! the `__class` / `__handle` / `__ref` markers for objects.

use std::path::Path;

use chrono::{DateTime, Utc};
use logsnap_core::stack::RawTraceEntry;
use logsnap_core::{BreakpointInfo, DebugCall, LogsnapError, LogsnapResult, RequestInfo, StaticHost, Value};
use logsnap_protocol::LogpointId;
use serde::Deserialize;

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// One recorded request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Capture
{
    pub request: CapturedRequest,
    pub globals: JsonMap,
    pub constants: JsonMap,
    pub calls: Vec<CapturedCall>,
    pub errors: Vec<CapturedError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CapturedRequest
{
    /// RFC 3339 timestamp.
    pub request_time: Option<String>,
    pub uri: Option<String>,
    pub host: Option<String>,
    pub client_ip: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CapturedCall
{
    pub file: String,
    pub line: u32,
    pub project_id: u64,
    pub watched_name: Option<String>,
    pub watched: Option<serde_json::Value>,
    pub locals: JsonMap,
    pub trace: Vec<CapturedTraceEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CapturedTraceEntry
{
    pub function: String,
    pub class: Option<String>,
    #[serde(rename = "type")]
    pub call_type: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub args: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct CapturedError
{
    pub logpoint_id: LogpointId,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    /// Plain message, or an exception object with a `message` property.
    pub message: serde_json::Value,
}

impl Capture
{
    /// Read a capture file.
    pub fn load(path: &Path) -> LogsnapResult<Self>
    {
        let content = std::fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Request metadata.
    pub fn request_info(&self) -> LogsnapResult<RequestInfo>
    {
        let request_time = self
            .request
            .request_time
            .as_deref()
            .map(|t| {
                DateTime::parse_from_rfc3339(t)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| LogsnapError::Decode(format!("bad request_time {t:?}: {e}")))
            })
            .transpose()?;

        Ok(RequestInfo {
            request_time,
            uri: self.request.uri.clone(),
            host: self.request.host.clone(),
            client_ip: self.request.client_ip.clone(),
        })
    }

    /// Host state serving the recorded globals and constants.
    pub fn host(&self) -> StaticHost
    {
        StaticHost::new(self.globals.clone().into(), self.constants.clone().into())
    }
}

impl CapturedCall
{
    pub fn to_debug_call(&self) -> DebugCall
    {
        let trace = self
            .trace
            .iter()
            .map(|t| RawTraceEntry {
                function: t.function.clone(),
                class: t.class.clone(),
                call_type: t.call_type.clone(),
                file: t.file.clone(),
                line: t.line,
                args: t.args.iter().cloned().map(Value::from).collect(),
            })
            .collect();

        DebugCall {
            watched: self.watched.clone().map(Value::from),
            watched_name: self.watched_name.clone(),
            locals: self.locals.clone().into(),
            trace,
            called_from_file: self.file.clone(),
            called_from_line: self.line,
            project_id: self.project_id,
        }
    }
}

impl CapturedError
{
    pub fn breakpoint(&self) -> BreakpointInfo
    {
        BreakpointInfo {
            id: self.logpoint_id.clone(),
            file: self.file.clone(),
            line: self.line,
        }
    }

    pub fn error(&self) -> Value
    {
        Value::from(self.message.clone())
    }
}
