#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! MCP Server Integration Tests
//!
//! End-to-end tests for the job agent over the stdio and SSE transports.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures::StreamExt;
use serde_json::{Value, json};
use std::fs;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;
use wil_job_agent::catalog::Catalog;
use wil_job_agent::commands::load_catalog;
use wil_job_agent::config::Config;
use wil_job_agent::mcp::sse::{SseState, router, serve_with_shutdown};
use wil_job_agent::mcp::{McpServer, build_server};

fn test_server() -> Arc<McpServer> {
    let server = build_server(&Config::default().server, Arc::new(Catalog::builtin()))
        .expect("Failed to build MCP server");
    Arc::new(server)
}

/// Pull the next SSE frame off the stream as text
async fn next_event<S>(stream: &mut S) -> String
where
    S: futures::Stream<Item = Result<axum::body::Bytes, axum::Error>> + Unpin,
{
    let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("SSE frame should arrive in time")
        .expect("SSE stream should stay open")
        .expect("SSE frame should be readable");
    String::from_utf8(frame.to_vec()).expect("SSE frame is UTF-8")
}

fn event_field<'a>(event: &'a str, name: &str) -> Option<&'a str> {
    event
        .lines()
        .find_map(|line| line.strip_prefix(name)?.strip_prefix(':'))
        .map(str::trim_start)
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .expect("valid request")
}

/// In-memory log sink for a scoped tracing subscriber
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        let buffer = self.0.lock().expect("log buffer lock");
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn open_stream_request() -> Request<Body> {
    Request::builder()
        .uri("/sse/jobagent")
        .body(Body::empty())
        .expect("valid request")
}

#[tokio::test]
async fn server_registers_tools_and_resources() {
    let server = test_server();

    assert_eq!(server.server_info.name, "wiljobagent");
    assert_eq!(
        server.tool_names(),
        vec!["get_job_details".to_string(), "search_wil_jobs".to_string()]
    );
    assert_eq!(
        server.resource_uris(),
        vec![
            "mcp://jobAgent/wil/employers".to_string(),
            "mcp://jobAgent/wil/job_titles".to_string()
        ]
    );
}

#[tokio::test]
async fn stdio_session_round_trip() {
    let input = [
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-06-18",
                "capabilities": {},
                "clientInfo": {"name": "stdio-test", "version": "1.0"}
            }
        })
        .to_string(),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
        String::new(),
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "search_wil_jobs", "arguments": {"keywords": ["selenium"]}}
        })
        .to_string(),
        "this is not json".to_string(),
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "get_job_details", "arguments": {"job_id": "job3"}}
        })
        .to_string(),
    ]
    .join("\n");

    let mut output = Vec::new();
    test_server()
        .serve_lines(input.as_bytes(), &mut output)
        .await
        .expect("stdio loop should finish at EOF");

    let replies: Vec<Value> = String::from_utf8(output)
        .expect("output is UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each reply is JSON"))
        .collect();

    assert_eq!(replies.len(), 4);
    assert_eq!(replies[0]["id"], 1);
    assert_eq!(replies[0]["result"]["protocolVersion"], "2025-06-18");

    assert_eq!(replies[1]["id"], 2);
    let matches = &replies[1]["result"]["structuredContent"]["result"];
    assert_eq!(matches.as_array().map(Vec::len), Some(1));
    assert_eq!(matches[0]["title"], "QA Analyst Co-op");

    assert!(replies[2]["id"].is_null());
    assert_eq!(replies[2]["error"]["code"], -32700);

    assert_eq!(replies[3]["id"], 3);
    assert_eq!(
        replies[3]["result"]["structuredContent"]["result"]["location"],
        "Toronto, ON"
    );
}

#[tokio::test]
async fn stdio_recovers_from_invalid_utf8() {
    let input = b"\xff\xfe garbage\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n";

    let mut output = Vec::new();
    test_server()
        .serve_lines(&input[..], &mut output)
        .await
        .expect("stdio loop should finish at EOF");

    let replies: Vec<Value> = String::from_utf8(output)
        .expect("output is UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each reply is JSON"))
        .collect();

    assert_eq!(replies.len(), 2);
    assert!(replies[0]["id"].is_null());
    assert_eq!(replies[0]["error"]["code"], -32700);
    assert_eq!(replies[1]["id"], 1);
    assert_eq!(replies[1]["result"], json!({}));
}

#[tokio::test]
async fn sse_session_round_trip() {
    let config = Config::default();
    let state = SseState::new(test_server(), &config.server);
    let app = router(state.clone());

    let response = app
        .clone()
        .oneshot(open_stream_request())
        .await
        .expect("SSE request succeeds");

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let mut events = response.into_body().into_data_stream();
    let announcement = next_event(&mut events).await;
    assert_eq!(event_field(&announcement, "event"), Some("endpoint"));
    let endpoint = event_field(&announcement, "data")
        .expect("endpoint data")
        .to_string();
    assert!(endpoint.starts_with("/messages/?session_id="));
    assert_eq!(state.session_count().await, 1);

    let request = json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "resources/read",
        "params": {"uri": "mcp://jobAgent/wil/employers"}
    });
    let response = app
        .clone()
        .oneshot(post(&endpoint, request.to_string()))
        .await
        .expect("POST succeeds");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let reply = next_event(&mut events).await;
    assert_eq!(event_field(&reply, "event"), Some("message"));
    let reply: Value =
        serde_json::from_str(event_field(&reply, "data").expect("message data")).expect("JSON");
    assert_eq!(reply["id"], 7);
    let employers: Vec<String> = serde_json::from_str(
        reply["result"]["contents"][0]["text"]
            .as_str()
            .expect("resource text"),
    )
    .expect("employers JSON");
    assert!(employers.contains(&"Manulife Financial".to_string()));

    let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let response = app
        .clone()
        .oneshot(post(&endpoint, notification.to_string()))
        .await
        .expect("POST succeeds");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    drop(events);
    for _ in 0..50 {
        if state.session_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(state.session_count().await, 0);

    let response = app
        .oneshot(post(&endpoint, json!({"jsonrpc": "2.0", "id": 8, "method": "ping"}).to_string()))
        .await
        .expect("POST succeeds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sse_rejects_bad_messages() {
    let config = Config::default();
    let state = SseState::new(test_server(), &config.server);
    let app = router(state);

    let response = app
        .clone()
        .oneshot(post("/messages/", "{}"))
        .await
        .expect("POST succeeds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post("/messages/?session_id=not-a-uuid", "{}"))
        .await
        .expect("POST succeeds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post(
            "/messages/?session_id=0123456789abcdef0123456789abcdef",
            "{}",
        ))
        .await
        .expect("POST succeeds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/sse/elsewhere")
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sse_rejects_unparseable_body_for_live_session() {
    let config = Config::default();
    let state = SseState::new(test_server(), &config.server);
    let app = router(state);

    let response = app
        .clone()
        .oneshot(open_stream_request())
        .await
        .expect("SSE request succeeds");
    let mut events = response.into_body().into_data_stream();
    let announcement = next_event(&mut events).await;
    let endpoint = event_field(&announcement, "data")
        .expect("endpoint data")
        .to_string();

    let response = app
        .oneshot(post(&endpoint, "{\"jsonrpc\": \"2.0\""))
        .await
        .expect("POST succeeds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn server_built_from_catalog_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let catalog_path = temp_dir.path().join("jobs.toml");
    fs::write(
        &catalog_path,
        r#"
employers = ["Ontario Public Service"]
job_titles = ["Business Analyst"]

[[jobs]]
id = "ops-1"
title = "Business Analyst Co-op"
company = "Ontario Public Service"
location = "Toronto, ON"
description = "Gather requirements for digital services."
program_area = "Business Analysis"
keywords = ["requirements", "co-op"]
"#,
    )
    .expect("should write catalog");

    let mut config = Config::default();
    config.catalog.path = Some(catalog_path);

    let catalog = load_catalog(&config).expect("catalog loads");
    let server = Arc::new(build_server(&config.server, catalog).expect("server builds"));

    let input = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {"name": "search_wil_jobs", "arguments": {"location": "toronto"}}
    })
    .to_string();

    let mut output = Vec::new();
    server
        .serve_lines(input.as_bytes(), &mut output)
        .await
        .expect("stdio loop finishes");

    let reply: Value = serde_json::from_slice(&output).expect("reply is JSON");
    let matches = &reply["result"]["structuredContent"]["result"];
    assert_eq!(matches.as_array().map(Vec::len), Some(1));
    assert_eq!(matches[0]["id"], "ops-1");
}

#[tokio::test]
async fn sse_stream_sends_keep_alive_comments() {
    let mut config = Config::default();
    config.server.keep_alive_secs = 1;
    let app = router(SseState::new(test_server(), &config.server));

    let response = app
        .oneshot(open_stream_request())
        .await
        .expect("SSE request succeeds");
    let mut events = response.into_body().into_data_stream();

    let announcement = next_event(&mut events).await;
    assert_eq!(event_field(&announcement, "event"), Some("endpoint"));

    let keep_alive = next_event(&mut events).await;
    assert!(
        keep_alive.starts_with(':'),
        "expected a keep-alive comment, got {keep_alive:?}"
    );
}

#[tokio::test]
async fn sse_requests_are_logged_at_debug() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = router(SseState::new(test_server(), &Config::default().server));
    let response = app
        .oneshot(post(
            "/messages/?session_id=0123456789abcdef0123456789abcdef",
            "{}",
        ))
        .await
        .expect("POST succeeds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let logs = logs.contents();
    assert!(logs.contains(
        "Incoming request: POST /messages/?session_id=0123456789abcdef0123456789abcdef"
    ));
    assert!(logs.contains("Query params: session_id=0123456789abcdef0123456789abcdef"));
    assert!(logs.contains("Response status: 404 Not Found"));
}

#[tokio::test]
async fn sse_shutdown_closes_open_streams() {
    let state = SseState::new(test_server(), &Config::default().server);
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind an ephemeral port");
    let address = listener.local_addr().expect("listener has an address");

    let (trigger, signal) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_with_shutdown(listener, state.clone(), async move {
        let _ = signal.await;
    }));

    let mut stream = TcpStream::connect(address)
        .await
        .expect("should connect to the server");
    stream
        .write_all(b"GET /sse/jobagent HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .expect("should send request");

    let mut received = Vec::new();
    let mut chunk = [0_u8; 1024];
    while !String::from_utf8_lossy(&received).contains("session_id=") {
        let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk))
            .await
            .expect("endpoint event should arrive in time")
            .expect("stream is readable");
        assert!(read > 0, "stream closed before the endpoint event");
        received.extend_from_slice(&chunk[..read]);
    }
    assert_eq!(state.session_count().await, 1);

    trigger.send(()).expect("server is waiting for the signal");

    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
        .await
        .expect("event stream should end after shutdown")
        .expect("stream is readable");
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after shutdown")
        .expect("server task should not panic")
        .expect("server should exit cleanly");
    assert_eq!(state.session_count().await, 0);
}
