//! Purpose: End-to-end tests for the `dpaste` binary against a loopback stub service.
//! Exports: None (integration test module).
//! Role: Validate post/get/shell flows, exit codes, and stderr error envelopes.
//! Invariants: The stub binds 127.0.0.1:0 and runs on its own thread for the test's lifetime.
//! Invariants: Usage errors must leave the stub's request counter untouched.
use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;

struct StubState {
    base_url: String,
    html: bool,
    hits: AtomicUsize,
    pastes: Mutex<Vec<(String, String)>>,
    expires: Mutex<Vec<String>>,
}

struct Stub {
    state: Arc<StubState>,
}

impl Stub {
    fn start(html: bool) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.set_nonblocking(true).expect("nonblocking");
        let addr = listener.local_addr().expect("addr");
        let state = Arc::new(StubState {
            base_url: format!("http://{addr}/"),
            html,
            hits: AtomicUsize::new(0),
            pastes: Mutex::new(Vec::new()),
            expires: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/api/", post(create_paste))
            .route("/:hash/raw", get(raw_paste))
            .with_state(state.clone());
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).expect("listener");
                let _ = axum::serve(listener, app).await;
            });
        });
        Self { state }
    }

    fn base_url(&self) -> &str {
        &self.state.base_url
    }

    fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    fn expires(&self) -> Vec<String> {
        self.state.expires.lock().expect("lock").clone()
    }
}

async fn create_paste(
    State(state): State<Arc<StubState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let content = form.get("content").cloned().unwrap_or_default();
    let expires = form.get("expires").cloned().unwrap_or_default();
    if form.get("format").map(String::as_str) != Some("URL") {
        return (StatusCode::BAD_REQUEST, "unsupported format").into_response();
    }
    state.expires.lock().expect("lock").push(expires);
    let mut pastes = state.pastes.lock().expect("lock");
    let hash = format!("P{}", pastes.len() + 1);
    pastes.push((hash.clone(), content));
    format!("\"{}{hash}\"", state.base_url).into_response()
}

async fn raw_paste(State(state): State<Arc<StubState>>, Path(hash): Path<String>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let pastes = state.pastes.lock().expect("lock");
    let Some((_, content)) = pastes.iter().find(|(key, _)| *key == hash) else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };
    if state.html {
        let escaped = content
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;");
        return Html(format!(
            "<!DOCTYPE html><html><head><title>{hash}</title></head>\
             <body><div class=\"code\"><pre><span class=\"n\">{escaped}</span></pre></div></body></html>"
        ))
        .into_response();
    }
    content.clone().into_response()
}

fn cmd(stub: &Stub) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_dpaste"));
    command
        .env_remove("DPASTE_BASE_URL")
        .env_remove("DPASTE_API_URL")
        .args(["--base-url", stub.base_url()]);
    command
}

fn run_with_stdin(mut command: Command, input: &str) -> Output {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("output")
}

fn stdout_text(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf8")
}

fn stderr_json(output: &Output) -> Value {
    let text = String::from_utf8_lossy(&output.stderr);
    let line = text.lines().last().expect("stderr line");
    serde_json::from_str(line).expect("valid json")
}

#[test]
fn post_then_get_round_trip() {
    let stub = Stub::start(false);

    let posted = cmd(&stub).args(["post", "print(42)"]).output().expect("post");
    assert!(posted.status.success());
    let url = stdout_text(&posted).trim().to_string();
    assert_eq!(url, format!("{}P1", stub.base_url()));
    assert_eq!(stub.expires(), ["3600"]);

    let by_url = cmd(&stub).args(["get", &url]).output().expect("get url");
    assert!(by_url.status.success());
    assert_eq!(stdout_text(&by_url), "print(42)\n");

    let by_hash = cmd(&stub).args(["get", "P1"]).output().expect("get hash");
    assert_eq!(stdout_text(&by_hash), stdout_text(&by_url));
}

#[test]
fn post_reads_stdin_and_keeps_trailing_newline() {
    let stub = Stub::start(false);

    let mut post = cmd(&stub);
    post.args(["post", "-1w"]);
    let posted = run_with_stdin(post, "line one\nline two\n");
    assert!(posted.status.success());
    assert_eq!(stub.expires(), ["604800"]);

    let fetched = cmd(&stub).args(["get", "P1"]).output().expect("get");
    assert_eq!(stdout_text(&fetched), "line one\nline two\n");
}

#[test]
fn post_from_file_with_silent_output() {
    let stub = Stub::start(false);
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("snippet.py");
    std::fs::write(&path, "x = 1\n").expect("write");

    let posted = cmd(&stub)
        .args(["post", "-s", "-1x", "--file", path.to_str().expect("path")])
        .output()
        .expect("post");
    assert!(posted.status.success());
    assert!(posted.stdout.is_empty());
    assert_eq!(stub.expires(), ["onetime"]);
}

#[test]
fn post_json_envelope() {
    let stub = Stub::start(false);
    let posted = cmd(&stub)
        .args(["post", "--json", "-1d", "hello"])
        .output()
        .expect("post");
    assert!(posted.status.success());
    let value: Value = serde_json::from_slice(&posted.stdout).expect("json");
    assert_eq!(value["paste"]["url"], format!("{}P1", stub.base_url()));
    assert_eq!(value["paste"]["raw_url"], format!("{}P1/raw", stub.base_url()));
    assert_eq!(value["paste"]["expires"], "day");
}

#[test]
fn conflicting_expiration_is_usage_error_without_request() {
    let stub = Stub::start(false);
    let output = cmd(&stub)
        .args(["post", "-1h", "-1d", "print(1)"])
        .output()
        .expect("post");
    assert_eq!(output.status.code(), Some(2));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"], "Usage");
    assert_eq!(err["error"]["message"], "too many options for expiration");
    assert_eq!(stub.hits(), 0);
}

#[test]
fn never_expiration_is_rejected_without_request() {
    let stub = Stub::start(false);
    let output = cmd(&stub)
        .args(["post", "-0", "print(1)"])
        .output()
        .expect("post");
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_json(&output)["error"]["hint"].is_string());
    assert_eq!(stub.hits(), 0);
}

#[test]
fn empty_stdin_is_usage_error() {
    let stub = Stub::start(false);
    let mut post = cmd(&stub);
    post.arg("post");
    let output = run_with_stdin(post, "  \n");
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stub.hits(), 0);
}

#[test]
fn html_page_is_unwrapped_with_url_comment() {
    let stub = Stub::start(true);
    let posted = cmd(&stub).args(["post", "-s", "a < b && c"]).output().expect("post");
    assert!(posted.status.success());

    let fetched = cmd(&stub).args(["get", "-u", "P1"]).output().expect("get");
    assert!(fetched.status.success());
    assert_eq!(
        stdout_text(&fetched),
        format!("# {}P1/raw\n\na < b && c\n", stub.base_url())
    );
}

#[test]
fn get_to_file_writes_snippet() {
    let stub = Stub::start(false);
    cmd(&stub).args(["post", "-s", "saved"]).output().expect("post");
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("out.txt");

    let fetched = cmd(&stub)
        .args(["get", "--to", path.to_str().expect("path"), "P1"])
        .output()
        .expect("get");
    assert!(fetched.status.success());
    assert!(fetched.stdout.is_empty());
    assert_eq!(std::fs::read_to_string(&path).expect("read"), "saved");
}

#[test]
fn missing_paste_is_not_found() {
    let stub = Stub::start(false);
    let output = cmd(&stub).args(["get", "NOPE"]).output().expect("get");
    assert_eq!(output.status.code(), Some(3));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"], "NotFound");
    assert_eq!(err["error"]["status"], 404);
    assert_eq!(err["error"]["url"], format!("{}NOPE/raw", stub.base_url()));
}

#[test]
fn get_rejects_two_references() {
    let stub = Stub::start(false);
    let output = cmd(&stub).args(["get", "P1", "P2"]).output().expect("get");
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(
        stderr_json(&output)["error"]["message"],
        "only one hash currently supported"
    );
    assert_eq!(stub.hits(), 0);
}

#[test]
fn unreachable_service_is_io_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_dpaste"))
        .args(["--base-url", "http://127.0.0.1:1/", "--timeout", "5", "get", "P1"])
        .output()
        .expect("get");
    assert_eq!(output.status.code(), Some(6));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"], "Io");
    assert!(err["error"]["hint"].is_string());
}

#[test]
fn shell_runs_line_commands_and_cells() {
    let stub = Stub::start(false);
    let mut shell = cmd(&stub);
    shell.arg("shell");
    let output = run_with_stdin(
        shell,
        "%dpaste -o hello  there\n%%dpaste -s -1d\ndef f():\n    pass\n%%\n%dpaste -1h -1w bad\n%getdpaste P2\nexit\n",
    );
    assert!(output.status.success());
    assert_eq!(
        stdout_text(&output),
        format!("{}P1\ndef f():\n    pass\n", stub.base_url())
    );
    assert_eq!(stub.expires(), ["3600", "86000"]);
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"], "Usage");
}

#[test]
fn version_emits_json_when_piped() {
    let output = Command::new(env!("CARGO_BIN_EXE_dpaste"))
        .arg("version")
        .output()
        .expect("version");
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["name"], "dpaste");
}
