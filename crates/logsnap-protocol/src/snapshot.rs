//! Snapshot, frame and stack entry records.

use serde::{Deserialize, Serialize};

/// Request metadata captured once, when the first frame of a request is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo
{
    /// Request start time formatted as `HH:MM:SS`.
    pub request_time: String,
    /// Request URI (or the script invocation for CLI runs).
    pub request_uri: String,
    /// `Host` the request was addressed to.
    pub host: String,
    /// Address of the client that issued the request.
    pub client_ip: String,
}

/// All frames captured during one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot
{
    /// Request metadata.
    pub snapshot_info: SnapshotInfo,
    /// Frames in the order the logpoints were hit.
    pub frames: Vec<Frame>,
}

impl Snapshot
{
    /// Empty snapshot for the given request.
    #[must_use]
    pub fn new(snapshot_info: SnapshotInfo) -> Self
    {
        Self {
            snapshot_info,
            frames: Vec::new(),
        }
    }
}

/// State captured at one logpoint hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame
{
    /// File of the logpoint, relative to the project root when known.
    pub filename: String,
    /// Line of the logpoint.
    pub lineno: u32,
    /// Wall clock time of the hit, `HH:MM:SS`.
    pub timestamp: String,
    /// Calendar date of the hit, `YYYY-MM-DD`.
    pub date: String,
    /// Seconds since the Unix epoch with sub-second precision.
    pub microtime: f64,
    /// Call stack, call site first. Never empty.
    pub stack: Vec<StackEntry>,
}

/// Kind of source a stack entry points into.
///
/// Consumers only understand `"file"`. Native calls without a source file are
/// still `File` entries; their file name is the `[internal]` placeholder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind
{
    /// A source file.
    #[default]
    File,
}

/// One level of the call stack within a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEntry
{
    /// Call descriptor, e.g. `foo()`, `Cart->total()`, `{main}`.
    #[serde(rename = "where")]
    pub call: String,
    /// Source kind.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Normalized file path.
    pub filename: String,
    /// Line number.
    pub lineno: u32,
    /// Whether variable groups were attached to this entry.
    pub retrieve_context: bool,
    /// Rendered variable groups, empty when `retrieve_context` is false.
    pub dump_readable: String,
}

impl StackEntry
{
    /// Entry without any variable context.
    pub fn new(call: impl Into<String>, kind: EntryKind, filename: impl Into<String>, lineno: u32) -> Self
    {
        Self {
            call: call.into(),
            kind,
            filename: filename.into(),
            lineno,
            retrieve_context: false,
            dump_readable: String::new(),
        }
    }
}

/// Payload of a `logpoint-error-evaluating` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord
{
    /// Plain error message.
    pub error_message: String,
    /// File of the breakpoint that failed to evaluate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Line of the breakpoint that failed to evaluate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_stack_entry_uses_wire_names()
    {
        let entry = StackEntry::new("{main}", EntryKind::File, "a.php", 10);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["where"], "{main}");
        assert_eq!(json["type"], "file");
        assert_eq!(json["retrieve_context"], false);
        assert_eq!(json["dump_readable"], "");
    }

    #[test]
    fn test_native_entry_is_still_a_file()
    {
        let entry = StackEntry::new("array_map()", EntryKind::default(), "[internal]", 0);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["type"], "file");
        assert_eq!(json["filename"], "[internal]");
    }

    #[test]
    fn test_error_record_omits_missing_location()
    {
        let record = ErrorRecord {
            error_message: "boom".to_string(),
            filename: None,
            lineno: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"error_message":"boom"}"#);
    }
}
