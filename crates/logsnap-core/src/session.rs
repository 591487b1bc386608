//! # Snapshot session
//!
//! A [`Session`] accumulates the frames of one request and delivers them as a
//! single `debug-event` payload when the request ends.
//!
//! ## Lifecycle
//!
//! 1. created with the request's metadata, uninitialized
//! 2. [`Session::init`] on the first frame: fixes the header and mints the
//!    delivery name
//! 3. [`Session::append`] once per frame, in call order
//! 4. [`Session::finalize`] exactly once in effect; later calls are no-ops.
//!    Dropping the session finalizes it, so a request that unwinds early still
//!    ships what it captured.

use chrono::{DateTime, Utc};
use logsnap_protocol::{Envelope, Frame, Header, Snapshot};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::host::RequestInfo;
use crate::sink::{delivery_name, Dispatcher, SNAPSHOT_EXTENSION};

/// What to do with a session that was initialized but holds no frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptySnapshotPolicy
{
    /// Deliver the empty snapshot.
    #[default]
    Deliver,
    /// Deliver nothing.
    Skip,
}

#[derive(Debug)]
struct Pending
{
    name: String,
    header: Header,
    snapshot: Snapshot,
}

/// Per-request frame accumulator.
#[derive(Debug)]
pub struct Session
{
    request: RequestInfo,
    dispatcher: Dispatcher,
    policy: EmptySnapshotPolicy,
    file_prefix: String,
    pending: Option<Pending>,
    first_frame: bool,
    closed: bool,
}

impl Session
{
    /// Uninitialized session for `request`.
    pub fn new(request: RequestInfo, dispatcher: Dispatcher, policy: EmptySnapshotPolicy, file_prefix: impl Into<String>) -> Self
    {
        Self {
            request,
            dispatcher,
            policy,
            file_prefix: file_prefix.into(),
            pending: None,
            first_frame: true,
            closed: false,
        }
    }

    /// Initialize on first use. Calling it again, or after the session closed,
    /// does nothing.
    pub fn init(&mut self, project_id: u64, now: DateTime<Utc>)
    {
        if self.pending.is_some() || self.closed {
            return;
        }

        let name = delivery_name(&self.file_prefix, now, SNAPSHOT_EXTENSION);
        debug!(name = %name, project_id, "snapshot session started");

        self.pending = Some(Pending {
            name,
            header: Header::for_project(project_id),
            snapshot: Snapshot::new(self.request.snapshot_info()),
        });
        self.first_frame = true;
    }

    /// Append a frame. An uninitialized session initializes itself with an
    /// unknown project; a closed session drops the frame.
    pub fn append(&mut self, frame: Frame)
    {
        if self.closed {
            warn!(file = %frame.filename, line = frame.lineno, "frame after session end dropped");
            return;
        }
        if self.pending.is_none() {
            warn!("frame appended before session init");
            self.init(0, Utc::now());
        }
        if let Some(pending) = self.pending.as_mut() {
            pending.snapshot.frames.push(frame);
        }
        self.first_frame = false;
    }

    /// Whether [`init`](Self::init) ran and the session is still open.
    #[must_use]
    pub fn is_initialized(&self) -> bool
    {
        self.pending.is_some()
    }

    /// Whether the next frame is the first of the request.
    #[must_use]
    pub fn is_first_frame(&self) -> bool
    {
        self.first_frame
    }

    /// Whether the session has been finalized.
    #[must_use]
    pub fn is_closed(&self) -> bool
    {
        self.closed
    }

    /// Frames captured so far.
    #[must_use]
    pub fn frame_count(&self) -> usize
    {
        self.pending.as_ref().map_or(0, |p| p.snapshot.frames.len())
    }

    /// Snapshot captured so far.
    #[must_use]
    pub fn snapshot(&self) -> Option<&Snapshot>
    {
        self.pending.as_ref().map(|p| &p.snapshot)
    }

    /// Name the snapshot will be delivered under.
    #[must_use]
    pub fn delivery_id(&self) -> Option<&str>
    {
        self.pending.as_ref().map(|p| p.name.as_str())
    }

    /// Deliver the snapshot and close the session. Returns whether a payload
    /// was written; every call after the first returns `false`.
    pub fn finalize(&mut self) -> bool
    {
        if self.closed {
            return false;
        }
        self.closed = true;

        let Some(pending) = self.pending.take() else {
            debug!("session never initialized, nothing to deliver");
            return false;
        };

        if pending.snapshot.frames.is_empty() && self.policy == EmptySnapshotPolicy::Skip {
            debug!(name = %pending.name, "empty snapshot skipped");
            return false;
        }

        let frames = pending.snapshot.frames.len();
        let envelope = Envelope::Debug {
            header: pending.header,
            data: pending.snapshot,
        };
        let delivered = self.dispatcher.deliver(&pending.name, &envelope);
        debug!(name = %pending.name, frames, delivered, "session finalized");
        delivered
    }
}

impl Drop for Session
{
    fn drop(&mut self)
    {
        self.finalize();
    }
}
