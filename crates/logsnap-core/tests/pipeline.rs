//! End-to-end tests of frame capture and snapshot delivery

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use logsnap_core::prelude::*;
use logsnap_core::render::RECURSION_MARKER;
use logsnap_core::vars::RESERVED_LOCALS;
use logsnap_core::Session;
use logsnap_protocol::{EntryKind, Envelope, Snapshot, DEBUG_EVENT};

fn config() -> AgentConfig
{
    AgentConfig {
        root: Some(PathBuf::from("/app")),
        ..AgentConfig::default()
    }
}

fn agent_with(config: AgentConfig, host: StaticHost) -> (Agent, Arc<MemorySink>)
{
    let sink = Arc::new(MemorySink::new());
    let clock = Arc::new(StepClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        Duration::milliseconds(10),
    ));
    (Agent::with_clock(config, sink.clone(), host, clock), sink)
}

fn agent() -> (Agent, Arc<MemorySink>)
{
    agent_with(config(), StaticHost::default())
}

fn request() -> RequestInfo
{
    RequestInfo {
        request_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 11, 59, 58).unwrap()),
        uri: Some("/checkout?step=2".to_string()),
        host: Some("shop.test".to_string()),
        client_ip: Some("10.0.0.7".to_string()),
    }
}

fn locals(pairs: Vec<(&str, Value)>) -> Bindings
{
    pairs.into_iter().collect()
}

fn delivered_snapshot(sink: &MemorySink) -> Snapshot
{
    let envelopes = sink.envelopes();
    assert_eq!(envelopes.len(), 1, "expected exactly one payload");
    match envelopes.into_iter().next() {
        Some(Envelope::Debug { data, .. }) => data,
        other => panic!("expected a debug event, got {other:?}"),
    }
}

#[test]
fn test_n_calls_give_n_frames_in_order()
{
    let (mut agent, sink) = agent();
    agent.begin_request(request());

    for line in 1..=5 {
        assert!(agent.debug(DebugCall::at("/app/a.php", line)));
    }
    assert!(agent.end_request());

    let snapshot = delivered_snapshot(&sink);
    let lines: Vec<u32> = snapshot.frames.iter().map(|f| f.lineno).collect();
    assert_eq!(lines, vec![1, 2, 3, 4, 5]);

    let micros: Vec<f64> = snapshot.frames.iter().map(|f| f.microtime).collect();
    assert!(micros.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_snapshot_info_comes_from_first_call()
{
    let (mut agent, sink) = agent();
    agent.begin_request(request());

    agent.debug(DebugCall::at("/app/a.php", 1).for_project(7));
    agent.debug(DebugCall::at("/app/b.php", 2).for_project(99));
    agent.end_request();

    let envelopes = sink.envelopes();
    let Envelope::Debug { header, data } = &envelopes[0] else {
        panic!("expected a debug event");
    };
    assert_eq!(header.project_id, Some(7));
    assert_eq!(data.snapshot_info.request_time, "11:59:58");
    assert_eq!(data.snapshot_info.request_uri, "/checkout?step=2");
    assert_eq!(data.snapshot_info.host, "shop.test");
    assert_eq!(data.snapshot_info.client_ip, "10.0.0.7");
}

#[test]
fn test_reserved_names_never_in_locals()
{
    let (mut agent, sink) = agent();
    agent.begin_request(request());

    let mut scope: Bindings = RESERVED_LOCALS.iter().map(|name| (*name, Value::from("secret"))).collect();
    scope.insert("order", Value::Int(3));
    agent.debug(DebugCall::at("/app/a.php", 4).with_locals(scope));

    let only_reserved: Bindings = RESERVED_LOCALS.iter().map(|name| (*name, Value::Null)).collect();
    agent.debug(DebugCall::at("/app/a.php", 5).with_locals(only_reserved));
    agent.end_request();

    let snapshot = delivered_snapshot(&sink);
    let first = &snapshot.frames[0].stack[0].dump_readable;
    assert!(first.contains("$order = 3;"));
    for name in RESERVED_LOCALS {
        assert!(!first.contains(&format!("${name} =")), "{name} leaked into locals");
    }
    assert!(!snapshot.frames[1].stack[0].retrieve_context);
}

#[test]
fn test_main_scenario()
{
    let (mut agent, sink) = agent();
    agent.begin_request(request());

    let call = DebugCall::at("/app/a.php", 10).with_locals(locals(vec![("x", Value::Int(5))]));
    assert!(agent.debug(call));
    agent.end_request();

    let snapshot = delivered_snapshot(&sink);
    let frame = &snapshot.frames[0];
    assert_eq!(frame.filename, "a.php");
    assert_eq!(frame.lineno, 10);

    let entry = &frame.stack[0];
    assert_eq!(entry.call, "{main}");
    assert_eq!(entry.kind, EntryKind::File);
    assert_eq!(entry.filename, "a.php");
    assert_eq!(entry.lineno, 10);
    assert!(entry.retrieve_context);
    assert!(entry.dump_readable.contains("$x = 5;"));
}

#[test]
fn test_named_call_scenario()
{
    let (mut agent, sink) = agent();
    agent.begin_request(request());

    let call = DebugCall::at("/app/a.php", 10).with_trace(vec![RawTraceEntry::call("foo", "/app/b.php", 20)]);
    agent.debug(call);
    agent.end_request();

    let snapshot = delivered_snapshot(&sink);
    let stack = &snapshot.frames[0].stack;
    assert_eq!(stack.len(), 1);
    assert_eq!(stack[0].call, "foo()");
    assert_eq!(stack[0].filename, "b.php");
}

#[test]
fn test_every_frame_has_a_stack_entry()
{
    let (mut agent, sink) = agent();
    agent.begin_request(request());
    agent.debug(DebugCall::at("/elsewhere/x.php", 1));
    agent.debug(DebugCall::default());
    agent.end_request();

    let snapshot = delivered_snapshot(&sink);
    assert!(snapshot.frames.iter().all(|f| !f.stack.is_empty()));
    assert_eq!(snapshot.frames[0].stack[0].filename, "/elsewhere/x.php");
}

#[test]
fn test_self_referential_value_is_bounded()
{
    let bounds = RenderBounds::default();
    let (mut agent, sink) = agent();
    agent.begin_request(request());

    let node = Value::object(
        "Node",
        Some(1),
        [
            ("label", Value::from("x".repeat(10_000))),
            (
                "next",
                Value::Reference {
                    class: "Node".to_string(),
                    handle: 1,
                },
            ),
            ("children", Value::Sequence((0..1_000).map(Value::Int).collect())),
        ],
    );
    agent.debug(DebugCall::at("/app/a.php", 3).watching("node", node));
    agent.end_request();

    let snapshot = delivered_snapshot(&sink);
    let dump = &snapshot.frames[0].stack[0].dump_readable;
    assert!(dump.contains(RECURSION_MARKER));
    assert!(dump.len() < (bounds.max_string + bounds.max_items) * 8);
}

#[test]
fn test_globals_only_on_first_frame()
{
    let host = StaticHost::new(
        locals(vec![("_SERVER", Value::mapping([("REQUEST_METHOD", Value::from("POST"))]))]),
        locals(vec![("APP_ENV", Value::from("prod"))]),
    );
    let (mut agent, sink) = agent_with(config(), host);
    agent.begin_request(request());
    agent.debug(DebugCall::at("/app/a.php", 1));
    agent.debug(DebugCall::at("/app/a.php", 2));
    agent.end_request();

    let snapshot = delivered_snapshot(&sink);
    let first = &snapshot.frames[0].stack[0].dump_readable;
    assert!(first.contains("// Superglobals"));
    assert!(first.contains("// User defined constants\nAPP_ENV = \"prod\";"));
    assert!(snapshot.frames[1].stack[0].dump_readable.is_empty());
}

#[test]
fn test_end_request_delivers_once()
{
    let (mut agent, sink) = agent();
    agent.begin_request(request());
    agent.debug(DebugCall::at("/app/a.php", 1));

    assert!(agent.end_request());
    assert!(!agent.end_request());
    drop(agent);
    assert_eq!(sink.deliveries().len(), 1);
}

#[test]
fn test_dropping_agent_flushes_open_session()
{
    let (mut agent, sink) = agent();
    agent.begin_request(request());
    agent.debug(DebugCall::at("/app/a.php", 1));
    drop(agent);

    let deliveries = sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert!(deliveries[0].name.starts_with("logsnap_"));
    assert!(deliveries[0].name.ends_with(".dump"));
}

#[test]
fn test_begin_request_flushes_previous_session()
{
    let (mut agent, sink) = agent();
    agent.begin_request(request());
    agent.debug(DebugCall::at("/app/a.php", 1));
    agent.begin_request(RequestInfo::default());
    agent.debug(DebugCall::at("/app/a.php", 2));
    agent.end_request();

    let envelopes = sink.envelopes();
    assert_eq!(envelopes.len(), 2);
    assert!(envelopes.iter().all(|e| e.event() == DEBUG_EVENT));
}

#[test]
fn test_request_without_frames()
{
    let (mut agent, sink) = agent();
    agent.begin_request(request());
    assert!(!agent.end_request(), "uninitialized session never delivers");
    assert!(sink.deliveries().is_empty());
}

#[test]
fn test_implicit_request()
{
    let (mut agent, sink) = agent();
    assert!(agent.session().is_none());

    agent.debug(DebugCall::at("/app/a.php", 1));
    assert_eq!(agent.session().map(Session::frame_count), Some(1));
    agent.end_request();

    let snapshot = delivered_snapshot(&sink);
    assert_eq!(snapshot.snapshot_info.request_uri, "(unknown)");
}

#[test]
fn test_deflate_encoding_end_to_end()
{
    let config = AgentConfig {
        encoding: PayloadEncoding::DeflateBase64,
        ..config()
    };
    let (mut agent, sink) = agent_with(config, StaticHost::default());
    agent.begin_request(request());
    agent.debug(DebugCall::at("/app/a.php", 1));
    agent.end_request();

    assert_ne!(sink.deliveries()[0].bytes.first(), Some(&b'{'));
    assert_eq!(delivered_snapshot(&sink).frames.len(), 1);
}
