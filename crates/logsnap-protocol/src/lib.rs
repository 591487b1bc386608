//! # logsnap-protocol
//!
//! Wire format for the payloads the logsnap agent hands to its delivery sinks.
//!
//! Every payload is a single JSON object without newlines:
//!
//! ```text
//! { "event": "debug-event" | "logpoint-error-evaluating",
//!   "header": { "project_id"?: int, "logpoint_id"?: id },
//!   "data": { ... } }
//! ```
//!
//! `data` is a [`Snapshot`] for `debug-event` and an [`ErrorRecord`] for
//! `logpoint-error-evaluating`. Both shapes live in this crate so that the agent
//! and whatever consumes its output (the `logsnap inspect` command, a web UI)
//! agree on one definition.

pub mod envelope;
pub mod snapshot;

pub use envelope::{Envelope, Header, LogpointId, DEBUG_EVENT, ERROR_EVENT};
pub use snapshot::{EntryKind, ErrorRecord, Frame, Snapshot, SnapshotInfo, StackEntry};
