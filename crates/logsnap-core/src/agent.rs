//! # Agent
//!
//! Host-facing entry points. One [`Agent`] lives per worker; the extension
//! brackets each request with [`Agent::begin_request`] and
//! [`Agent::end_request`] and calls [`Agent::debug`] on every logpoint hit.
//!
//! None of these methods return errors or panic into the host: failures are
//! logged and the answer is a `bool`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::clock::{Clock, SystemClock};
use crate::config::AgentConfig;
use crate::frame::{DebugCall, FrameBuilder};
use crate::host::{BreakpointInfo, HostState, RequestInfo};
use crate::render::Renderer;
use crate::report::{ErrorHandlerAdapter, ErrorReporter, EvaluationError};
use crate::session::Session;
use crate::sink::{DeliverySink, Dispatcher};
use crate::stack::StackNormalizer;

/// Snapshot agent for one worker.
pub struct Agent
{
    config: AgentConfig,
    builder: FrameBuilder,
    reporter: ErrorReporter,
    dispatcher: Dispatcher,
    host: Box<dyn HostState>,
    clock: Arc<dyn Clock>,
    session: Option<Session>,
    project_id: u64,
}

impl Agent
{
    /// Agent delivering to `sink`, reading global state from `host`.
    pub fn new(config: AgentConfig, sink: Arc<dyn DeliverySink>, host: impl HostState + 'static) -> Self
    {
        Self::with_clock(config, sink, host, Arc::new(SystemClock))
    }

    /// Agent with an explicit time source.
    pub fn with_clock(config: AgentConfig, sink: Arc<dyn DeliverySink>, host: impl HostState + 'static, clock: Arc<dyn Clock>) -> Self
    {
        let renderer = Renderer::new(config.render);
        let paths = config.path_normalizer();
        let dispatcher = Dispatcher::new(sink, config.encoding);

        let stack = StackNormalizer::new(paths.clone(), renderer, config.stack.clone());
        let builder = FrameBuilder::new(stack, renderer, Arc::clone(&clock), config.frame_options());
        let reporter = ErrorReporter::new(dispatcher.clone(), paths, Arc::clone(&clock), config.file_prefix.clone());

        debug!(
            root = ?builder.stack().paths().root(),
            encoding = ?config.encoding,
            "agent ready"
        );

        Self {
            config,
            builder,
            reporter,
            dispatcher,
            host: Box::new(host),
            clock,
            session: None,
            project_id: 0,
        }
    }

    /// Agent delivering to the sink named by `config`.
    pub fn from_config(config: AgentConfig, host: impl HostState + 'static) -> Self
    {
        let sink = config.open_sink();
        Self::new(config, sink, host)
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &AgentConfig
    {
        &self.config
    }

    /// Start a request. A session still open from a previous request is
    /// finalized first.
    pub fn begin_request(&mut self, request: RequestInfo)
    {
        if let Some(mut previous) = self.session.take() {
            debug!("previous request was not ended, finalizing");
            previous.finalize();
        }
        self.session = Some(self.new_session(request));
    }

    /// End the current request, delivering its snapshot. Returns whether a
    /// payload was written.
    pub fn end_request(&mut self) -> bool
    {
        match self.session.take() {
            Some(mut session) => session.finalize(),
            None => false,
        }
    }

    /// Current session, if a request is in progress.
    #[must_use]
    pub fn session(&self) -> Option<&Session>
    {
        self.session.as_ref()
    }

    /// Capture one logpoint hit. Returns `false` if capturing failed; the
    /// failure is logged and the request continues.
    pub fn debug(&mut self, call: DebugCall) -> bool
    {
        match catch_unwind(AssertUnwindSafe(|| self.capture(&call))) {
            Ok(()) => true,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(
                    file = %call.called_from_file,
                    line = call.called_from_line,
                    %reason,
                    "frame capture failed"
                );
                false
            }
        }
    }

    fn capture(&mut self, call: &DebugCall)
    {
        if self.session.is_none() {
            debug!("logpoint hit outside an explicit request");
            self.session = Some(self.new_session(RequestInfo::default()));
        }
        self.project_id = call.project_id;

        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_initialized() {
            session.init(call.project_id, self.clock.now());
        }

        let frame = self.builder.build(call, session.is_first_frame(), self.host.as_ref());
        debug!(
            file = %frame.filename,
            line = frame.lineno,
            entries = frame.stack.len(),
            "frame captured"
        );
        session.append(frame);
    }

    /// Report that a logpoint could not be evaluated. Always `true`.
    pub fn report_evaluation_error(&self, breakpoint: &BreakpointInfo, error: impl Into<EvaluationError>) -> bool
    {
        let error = error.into();
        catch_unwind(AssertUnwindSafe(|| {
            self.reporter.report_evaluation_error(breakpoint, self.project_id, &error)
        }))
        .unwrap_or(true)
    }

    /// Runtime error handler. Reports the error against the logpoint being
    /// evaluated; returns `false` when no logpoint is.
    pub fn handle_host_error(&self, errno: i64, errstr: &str) -> bool
    {
        catch_unwind(AssertUnwindSafe(|| {
            ErrorHandlerAdapter::new(&self.reporter, self.host.as_ref()).handle(errno, errstr, self.project_id)
        }))
        .unwrap_or(false)
    }

    fn new_session(&self, request: RequestInfo) -> Session
    {
        info!(uri = ?request.uri, "request started");
        Session::new(
            request,
            self.dispatcher.clone(),
            self.config.empty_snapshot,
            self.config.file_prefix.clone(),
        )
    }
}
