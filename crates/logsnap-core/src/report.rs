//! # Evaluation error reporting
//!
//! When the extension fails to evaluate a logpoint (a parse error in its
//! condition, a fatal error, an exception, or a warning raised while the
//! logpoint's expression runs) the failure is reported upstream at once as a
//! `logpoint-error-evaluating` payload, independent of any snapshot session.

use std::sync::Arc;

use logsnap_protocol::{Envelope, ErrorRecord, Header};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::host::{BreakpointInfo, HostState};
use crate::path::PathNormalizer;
use crate::sink::{delivery_name, Dispatcher, ERROR_EXTENSION};
use crate::value::Value;

/// Failure reported by the extension for one logpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationError
{
    /// Plain message.
    Message(String),
    /// Exception object raised by the evaluated code.
    Exception(Value),
}

impl EvaluationError
{
    /// Error from a Rust error value.
    #[must_use]
    pub fn from_error(error: &dyn std::error::Error) -> Self
    {
        Self::Message(error.to_string())
    }

    /// Message to report. Exceptions are unwrapped to their `message`
    /// property; objects without one fall back to their class name.
    #[must_use]
    pub fn message(&self) -> String
    {
        match self {
            Self::Message(message) => message.clone(),
            Self::Exception(Value::Object(object)) => match object.property("message") {
                Some(Value::String(message)) => message.clone(),
                Some(other) => crate::render::Renderer::default().render_inline(other),
                None => object.class.clone(),
            },
            Self::Exception(Value::String(message)) => message.clone(),
            Self::Exception(other) => crate::render::Renderer::default().render_inline(other),
        }
    }
}

impl From<&str> for EvaluationError
{
    fn from(message: &str) -> Self
    {
        Self::Message(message.to_string())
    }
}

impl From<String> for EvaluationError
{
    fn from(message: String) -> Self
    {
        Self::Message(message)
    }
}

impl From<Value> for EvaluationError
{
    fn from(value: Value) -> Self
    {
        Self::Exception(value)
    }
}

/// Delivers evaluation errors.
pub struct ErrorReporter
{
    dispatcher: Dispatcher,
    paths: PathNormalizer,
    clock: Arc<dyn Clock>,
    file_prefix: String,
}

impl ErrorReporter
{
    /// Reporter delivering through `dispatcher`.
    pub fn new(dispatcher: Dispatcher, paths: PathNormalizer, clock: Arc<dyn Clock>, file_prefix: impl Into<String>) -> Self
    {
        Self {
            dispatcher,
            paths,
            clock,
            file_prefix: file_prefix.into(),
        }
    }

    /// Report that `breakpoint` could not be evaluated.
    ///
    /// Always returns `true`: the extension treats the error as handled even
    /// when the payload could not be written (the failure is logged).
    pub fn report_evaluation_error(&self, breakpoint: &BreakpointInfo, project_id: u64, error: &EvaluationError) -> bool
    {
        let record = ErrorRecord {
            error_message: error.message(),
            filename: breakpoint.file.as_deref().map(|f| self.paths.normalize(f).into_owned()),
            lineno: breakpoint.line,
        };
        info!(
            logpoint = %breakpoint.id,
            message = %record.error_message,
            "logpoint evaluation failed"
        );

        let envelope = Envelope::EvaluationError {
            header: Header::for_project(project_id).with_logpoint(breakpoint.id.clone()),
            data: record,
        };
        let name = delivery_name(&self.file_prefix, self.clock.now(), ERROR_EXTENSION);
        self.dispatcher.deliver(&name, &envelope);
        true
    }
}

/// Bridges the host runtime's error handler to the reporter.
///
/// Warnings and notices raised while a logpoint is being evaluated are
/// reported against that logpoint; outside of evaluation they are left to the
/// runtime.
pub struct ErrorHandlerAdapter<'a>
{
    reporter: &'a ErrorReporter,
    host: &'a dyn HostState,
}

impl<'a> ErrorHandlerAdapter<'a>
{
    /// Adapter reporting through `reporter`, asking `host` which logpoint is
    /// being evaluated.
    #[must_use]
    pub fn new(reporter: &'a ErrorReporter, host: &'a dyn HostState) -> Self
    {
        Self { reporter, host }
    }

    /// Handle one runtime error. Returns whether it was reported.
    pub fn handle(&self, errno: i64, errstr: &str, project_id: u64) -> bool
    {
        let Some(breakpoint) = self.host.current_breakpoint() else {
            debug!(errno, "runtime error outside logpoint evaluation ignored");
            return false;
        };

        let message = format!("An error occurred while trying to evaluate breakpoint ({errno}): {errstr}");
        self.reporter
            .report_evaluation_error(&breakpoint, project_id, &EvaluationError::Message(message))
    }
}

#[cfg(test)]
mod tests
{
    use std::path::Path;

    use chrono::{TimeZone, Utc};
    use logsnap_protocol::LogpointId;

    use super::*;
    use crate::clock::StepClock;
    use crate::host::StaticHost;
    use crate::sink::{MemorySink, PayloadEncoding};

    fn reporter(sink: Arc<MemorySink>) -> ErrorReporter
    {
        let clock = Arc::new(StepClock::fixed(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
        ErrorReporter::new(
            Dispatcher::new(sink, PayloadEncoding::Json),
            PathNormalizer::new(Path::new("/app")),
            clock,
            "logsnap",
        )
    }

    #[test]
    fn test_exception_is_unwrapped()
    {
        let exception = Value::object(
            "RuntimeException",
            Some(3),
            vec![("message", Value::from("division by zero")), ("code", Value::Int(0))],
        );
        assert_eq!(EvaluationError::from(exception).message(), "division by zero");
        assert_eq!(
            EvaluationError::from(Value::object("Marker", None, Vec::<(String, Value)>::new())).message(),
            "Marker"
        );
        assert_eq!(EvaluationError::from("plain").message(), "plain");

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "watch target missing");
        assert_eq!(EvaluationError::from_error(&io).message(), "watch target missing");
    }

    #[test]
    fn test_report_delivers_message_payload()
    {
        let sink = Arc::new(MemorySink::new());
        let r = reporter(sink.clone());

        assert!(r.report_evaluation_error(&BreakpointInfo::new(42_u64, "/app/a.php", 7), 9, &"boom".into()));

        let deliveries = sink.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].name.starts_with("logsnap_"));
        assert!(deliveries[0].name.ends_with(".message"));

        match &sink.envelopes()[0] {
            Envelope::EvaluationError { header, data } => {
                assert_eq!(header.project_id, Some(9));
                assert_eq!(header.logpoint_id, Some(LogpointId::Number(42)));
                assert_eq!(data.error_message, "boom");
                assert_eq!(data.filename.as_deref(), Some("a.php"));
                assert_eq!(data.lineno, Some(7));
            }
            other => panic!("unexpected envelope {other:?}"),
        }
    }

    #[test]
    fn test_report_survives_failing_sink()
    {
        let r = reporter(Arc::new(MemorySink::failing()));
        assert!(r.report_evaluation_error(&BreakpointInfo::new(1_u64, "/app/a.php", 1), 0, &"x".into()));
    }

    #[test]
    fn test_error_handler_only_reports_during_evaluation()
    {
        let sink = Arc::new(MemorySink::new());
        let r = reporter(sink.clone());
        let host = StaticHost::default();
        let adapter = ErrorHandlerAdapter::new(&r, &host);

        assert!(!adapter.handle(2, "Division by zero", 0));
        assert!(sink.deliveries().is_empty());

        host.set_evaluating(Some(BreakpointInfo::new("lp-1", "/app/a.php", 7)));
        assert!(adapter.handle(2, "Division by zero", 0));

        match &sink.envelopes()[0] {
            Envelope::EvaluationError { data, .. } => assert_eq!(
                data.error_message,
                "An error occurred while trying to evaluate breakpoint (2): Division by zero"
            ),
            other => panic!("unexpected envelope {other:?}"),
        }
    }
}
