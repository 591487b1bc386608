//! # Frame building
//!
//! One frame per logpoint hit. The builder stamps the hit with the current
//! time, normalizes the stack and attaches rendered variable groups to the
//! call-site entry (index 0):
//!
//! 1. "Locals", with request superglobals removed, when any remain
//! 2. the explicitly watched value, as its own single-entry group
//! 3. on the first frame of a request only: "Superglobals" and
//!    "User defined constants", when non-empty
//!
//! Global state and constants do not change meaningfully within one request,
//! so they are captured once rather than per frame.

use std::sync::Arc;

use logsnap_protocol::Frame;
use serde::Deserialize;
use tracing::trace;

use crate::clock::{microtime, Clock};
use crate::host::HostState;
use crate::render::Renderer;
use crate::stack::{RawTraceEntry, StackNormalizer};
use crate::value::{Bindings, Value};
use crate::vars::{strip_reserved, VariableGroup, LOCALS, RESERVED_LOCALS, SUPERGLOBALS};

/// Arguments of one `debug` callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugCall
{
    /// Value the logpoint watches, if it watches one.
    pub watched: Option<Value>,
    /// Expression or variable name of the watched value.
    pub watched_name: Option<String>,
    /// Variables in scope at the call site.
    pub locals: Bindings,
    /// Raw backtrace, call site first.
    pub trace: Vec<RawTraceEntry>,
    /// File the logpoint fired in.
    pub called_from_file: String,
    /// Line the logpoint fired on.
    pub called_from_line: u32,
    /// Project the application belongs to, `0` when unknown.
    pub project_id: u64,
}

impl DebugCall
{
    /// Call fired at `file:line` with nothing captured yet.
    pub fn at(file: impl Into<String>, line: u32) -> Self
    {
        Self {
            called_from_file: file.into(),
            called_from_line: line,
            ..Self::default()
        }
    }

    /// Set the local scope.
    #[must_use]
    pub fn with_locals(mut self, locals: Bindings) -> Self
    {
        self.locals = locals;
        self
    }

    /// Set the raw trace.
    #[must_use]
    pub fn with_trace(mut self, trace: Vec<RawTraceEntry>) -> Self
    {
        self.trace = trace;
        self
    }

    /// Watch a single value.
    #[must_use]
    pub fn watching(mut self, name: impl Into<String>, value: Value) -> Self
    {
        self.watched_name = Some(name.into());
        self.watched = Some(value);
        self
    }

    /// Set the project identifier.
    #[must_use]
    pub fn for_project(mut self, project_id: u64) -> Self
    {
        self.project_id = project_id;
        self
    }
}

/// Variable-group options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FrameOptions
{
    /// Header of the watched-value group; unnamed when `None`.
    pub watch_label: Option<String>,
    /// Names removed from the local scope before it is rendered.
    pub reserved_names: Vec<String>,
}

impl Default for FrameOptions
{
    fn default() -> Self
    {
        Self {
            watch_label: None,
            reserved_names: RESERVED_LOCALS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Builds frames from `debug` callbacks.
pub struct FrameBuilder
{
    stack: StackNormalizer,
    renderer: Renderer,
    clock: Arc<dyn Clock>,
    options: FrameOptions,
}

impl FrameBuilder
{
    /// Builder with its collaborators.
    #[must_use]
    pub fn new(stack: StackNormalizer, renderer: Renderer, clock: Arc<dyn Clock>, options: FrameOptions) -> Self
    {
        Self {
            stack,
            renderer,
            clock,
            options,
        }
    }

    /// Stack normalizer in use.
    #[must_use]
    pub fn stack(&self) -> &StackNormalizer
    {
        &self.stack
    }

    /// Build the frame for `call`. `first_frame` selects whether global state is
    /// captured; the session clears it once the frame is appended.
    pub fn build(&self, call: &DebugCall, first_frame: bool, host: &dyn HostState) -> Frame
    {
        let now = self.clock.now();

        let (filename, lineno) = self
            .stack
            .frame_location(&call.trace, &call.called_from_file, call.called_from_line);
        let mut stack = self
            .stack
            .normalize(&call.trace, &call.called_from_file, call.called_from_line);

        // normalize() never returns an empty stack
        let site = &mut stack[0];

        let mut locals = call.locals.clone();
        strip_reserved(&mut locals, &self.options.reserved_names);
        if !locals.is_empty() {
            VariableGroup::named(LOCALS, locals).attach_to(site, &self.renderer);
        }

        if let Some(value) = &call.watched {
            VariableGroup::watched(
                self.options.watch_label.as_deref(),
                call.watched_name.as_deref(),
                value.clone(),
            )
            .attach_to(site, &self.renderer);
        }

        if first_frame {
            let globals = host.globals();
            if !globals.is_empty() {
                VariableGroup::named(SUPERGLOBALS, globals).attach_to(site, &self.renderer);
            }

            let constants = host.user_constants();
            if !constants.is_empty() {
                VariableGroup::constants(constants).attach_to(site, &self.renderer);
            }
        }

        trace!(
            file = %filename,
            line = lineno,
            depth = stack.len(),
            first_frame,
            "built frame"
        );

        Frame {
            filename,
            lineno,
            timestamp: now.format("%H:%M:%S").to_string(),
            date: now.format("%Y-%m-%d").to_string(),
            microtime: microtime(now),
            stack,
        }
    }
}
