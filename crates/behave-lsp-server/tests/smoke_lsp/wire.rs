//! A minimal LSP client for driving the `behave-lsp` binary over stdio.
//!
//! [`LspSession`] owns the child process. Frames are decoded on a reader
//! thread so that every wait is bounded and a stalled server fails the test
//! instead of hanging it.
#![expect(
    clippy::expect_used,
    reason = "wire failures are test-fatal and should name what broke"
)]

use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use lsp_types::Url;
use serde_json::{Value, json};

/// Longest wait for any single frame.
const FRAME_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest wait for the process to exit after `exit`.
const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Frames skipped while waiting for one response or notification.
const MAX_SKIPPED: usize = 20;

/// Read one `Content-Length` framed body; `None` once stdout closes.
fn read_frame(reader: &mut impl BufRead) -> Option<Value> {
    let mut length = None;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).ok()? == 0 {
            return None;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some(value) = header.strip_prefix("Content-Length:") {
            length = value.trim().parse::<usize>().ok();
        }
    }
    let mut body = vec![0; length?];
    reader.read_exact(&mut body).ok()?;
    serde_json::from_slice(&body).ok()
}

fn file_uri(path: &Path) -> String {
    Url::from_file_path(path).expect("file URI").to_string()
}

/// A running server plus the client half of its stdio connection.
pub struct LspSession {
    child: Child,
    stdin: ChildStdin,
    frames: Receiver<Value>,
    next_id: u64,
}

impl LspSession {
    /// Start the server over `root` and complete the initialize handshake.
    ///
    /// Returns the session and the `initialize` result.
    pub fn start(root: &Path) -> (Self, Value) {
        let mut child = Command::new(env!("CARGO_BIN_EXE_behave-lsp"))
            .args(["--log-level", "error"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("start behave-lsp");
        let stdin = child.stdin.take().expect("server stdin");
        let stdout = child.stdout.take().expect("server stdout");

        let (sender, frames) = mpsc::channel();
        thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            while let Some(frame) = read_frame(&mut reader) {
                if sender.send(frame).is_err() {
                    break;
                }
            }
        });

        let mut session = Self {
            child,
            stdin,
            frames,
            next_id: 1,
        };
        let root_uri = Url::from_directory_path(root).expect("root URI");
        let initialised = session.request(
            "initialize",
            json!({ "processId": null, "capabilities": {}, "rootUri": root_uri.as_str() }),
        );
        session.notify("initialized", json!({}));
        (session, initialised)
    }

    fn write(&mut self, message: &Value) {
        let body = serde_json::to_vec(message).expect("encode message");
        write!(self.stdin, "Content-Length: {}\r\n\r\n", body.len()).expect("write header");
        self.stdin.write_all(&body).expect("write body");
        self.stdin.flush().expect("flush stdin");
    }

    fn next_frame(&self) -> Value {
        self.frames
            .recv_timeout(FRAME_TIMEOUT)
            .expect("server sent nothing before the timeout")
    }

    /// Send a notification.
    pub fn notify(&mut self, method: &str, params: Value) {
        self.write(&json!({ "jsonrpc": "2.0", "method": method, "params": params }));
    }

    /// Send a request and wait for its response, skipping other frames.
    pub fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.write(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }));
        for _ in 0..MAX_SKIPPED {
            let frame = self.next_frame();
            if frame.get("id").and_then(Value::as_u64) == Some(id) {
                return frame;
            }
        }
        panic!("no response to {method} (id {id})");
    }

    /// Send a request positioned at `line:character` in `path`.
    pub fn request_at(&mut self, method: &str, path: &Path, line: u32, character: u32) -> Value {
        let mut params = json!({
            "textDocument": { "uri": file_uri(path) },
            "position": { "line": line, "character": character },
        });
        if method == "textDocument/references" {
            if let Some(fields) = params.as_object_mut() {
                fields.insert("context".into(), json!({ "includeDeclaration": false }));
            }
        }
        self.request(method, params)
    }

    /// Open `path` in the server with its on-disk content.
    pub fn open(&mut self, path: &Path) {
        let text = std::fs::read_to_string(path).expect("read opened file");
        let language = if path.extension().is_some_and(|ext| ext == "py") {
            "python"
        } else {
            "gherkin"
        };
        self.notify(
            "textDocument/didOpen",
            json!({
                "textDocument": {
                    "uri": file_uri(path),
                    "languageId": language,
                    "version": 1,
                    "text": text,
                }
            }),
        );
    }

    /// Wait for diagnostics on `path` that satisfy `accept`.
    ///
    /// Returns the diagnostics array of the first accepted publication.
    pub fn diagnostics_for(&self, path: &Path, accept: impl Fn(&[Value]) -> bool) -> Vec<Value> {
        let uri = file_uri(path);
        for _ in 0..MAX_SKIPPED {
            let frame = self.next_frame();
            if frame.get("method").and_then(Value::as_str)
                != Some("textDocument/publishDiagnostics")
            {
                continue;
            }
            let Some(params) = frame.get("params") else {
                continue;
            };
            if params.get("uri").and_then(Value::as_str) != Some(uri.as_str()) {
                continue;
            }
            let diagnostics = params
                .get("diagnostics")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if accept(&diagnostics) {
                return diagnostics;
            }
        }
        panic!("no matching diagnostics for {uri}");
    }

    /// Shut the server down and check that it exits cleanly.
    pub fn shutdown(mut self) {
        let response = self.request("shutdown", Value::Null);
        assert!(response.get("error").is_none(), "shutdown failed: {response}");
        self.notify("exit", Value::Null);

        let deadline = Instant::now() + EXIT_TIMEOUT;
        loop {
            if let Some(status) = self.child.try_wait().expect("poll server status") {
                assert!(status.success(), "server exited with {status}");
                return;
            }
            if Instant::now() >= deadline {
                let _ = self.child.kill();
                let _ = self.child.wait();
                panic!("server still running {EXIT_TIMEOUT:?} after exit");
            }
            thread::sleep(Duration::from_millis(50));
        }
    }
}
