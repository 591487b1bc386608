//! Evaluation error reporting and error type tests

use std::path::PathBuf;
use std::sync::Arc;

use logsnap_core::prelude::*;
use logsnap_core::{ConfigError, EvaluationError, SinkError};
use logsnap_protocol::{Envelope, LogpointId, ERROR_EVENT};

fn agent(host: Arc<StaticHost>) -> (Agent, Arc<MemorySink>)
{
    let sink = Arc::new(MemorySink::new());
    let config = AgentConfig {
        root: Some(PathBuf::from("/app")),
        ..AgentConfig::default()
    };
    (Agent::new(config, sink.clone(), host), sink)
}

#[test]
fn test_evaluation_error_scenario()
{
    let (agent, sink) = agent(Arc::new(StaticHost::default()));

    assert!(agent.report_evaluation_error(&BreakpointInfo::new(42_u64, "/app/a.php", 10), "Undefined variable"));

    let envelopes = sink.envelopes();
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].event(), ERROR_EVENT);
    assert_eq!(envelopes[0].header().logpoint_id, Some(LogpointId::Number(42)));
    let Envelope::EvaluationError { data, .. } = &envelopes[0] else {
        panic!("expected an evaluation error");
    };
    assert_eq!(data.error_message, "Undefined variable");
    assert_eq!(data.filename.as_deref(), Some("a.php"));
    assert_eq!(data.lineno, Some(10));

    assert!(sink.deliveries()[0].name.ends_with(".message"));
}

#[test]
fn test_exception_message_is_reported()
{
    let (agent, sink) = agent(Arc::new(StaticHost::default()));
    let exception = Value::object("ParseError", Some(2), [("message", Value::from("syntax error, unexpected ')'"))]);

    agent.report_evaluation_error(&BreakpointInfo::new("lp-7", "/app/a.php", 3), exception);

    let Envelope::EvaluationError { header, data } = &sink.envelopes()[0] else {
        panic!("expected an evaluation error");
    };
    assert_eq!(header.logpoint_id, Some(LogpointId::Text("lp-7".to_string())));
    assert_eq!(data.error_message, "syntax error, unexpected ')'");
}

#[test]
fn test_errors_are_independent_of_sessions()
{
    let (mut agent, sink) = agent(Arc::new(StaticHost::default()));
    agent.begin_request(RequestInfo::default());
    agent.debug(DebugCall::at("/app/a.php", 1).for_project(5));

    agent.report_evaluation_error(&BreakpointInfo::new(1_u64, "/app/a.php", 1), "x");
    assert_eq!(sink.deliveries().len(), 1, "error delivered immediately");
    assert_eq!(sink.envelopes()[0].header().project_id, Some(5));

    agent.end_request();
    assert_eq!(sink.deliveries().len(), 2);
}

#[test]
fn test_host_error_handler()
{
    let host = Arc::new(StaticHost::default());
    let (agent, sink) = agent(Arc::clone(&host));

    assert!(!agent.handle_host_error(8, "Undefined index: id"));
    assert!(sink.deliveries().is_empty());

    host.set_evaluating(Some(BreakpointInfo::new(42_u64, "/app/a.php", 10)));
    assert!(agent.handle_host_error(8, "Undefined index: id"));

    let Envelope::EvaluationError { data, .. } = &sink.envelopes()[0] else {
        panic!("expected an evaluation error");
    };
    assert_eq!(
        data.error_message,
        "An error occurred while trying to evaluate breakpoint (8): Undefined index: id"
    );
}

#[test]
fn test_report_with_failing_sink_still_handled()
{
    let config = AgentConfig::default();
    let agent = Agent::new(config, Arc::new(MemorySink::failing()), StaticHost::default());

    assert!(agent.report_evaluation_error(&BreakpointInfo::new(1_u64, "/app/a.php", 1), EvaluationError::from("x")));
}

#[test]
fn test_error_display()
{
    let err = LogsnapError::from(SinkError::NotWritable(PathBuf::from("/nope")));
    assert_eq!(err.to_string(), "Delivery failed: Directory is not writable: /nope");

    let err = LogsnapError::from(ConfigError::InvalidEnv {
        name: "LOGSNAP_ENCODING",
        value: "zip".to_string(),
    });
    assert_eq!(err.to_string(), "Configuration error: Invalid value for LOGSNAP_ENCODING: zip");

    let err = SinkError::Http {
        url: "http://c/ingest".to_string(),
        reason: "connection refused".to_string(),
    };
    assert!(err.to_string().contains("http://c/ingest"));
}

#[test]
fn test_error_conversion_from_io()
{
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: LogsnapError = io.into();
    assert!(matches!(err, LogsnapError::Io(_)));
}
