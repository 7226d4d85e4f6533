#![cfg(unix)]

use serde_json::{json, Value};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

const STEP_TIMEOUT: Duration = Duration::from_secs(20);

fn fake_sqlmap(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("sqlmap");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

struct Session {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

impl Session {
    async fn start(sqlmap: &Path, extra: &[&str]) -> Self {
        let mut child = Command::new(assert_cmd::cargo::cargo_bin!("sqlmap-mcp"))
            .arg(sqlmap)
            .args(extra)
            .env_remove("RUST_LOG")
            .env_remove("SQLMAP_MCP_TIMEOUT_SECS")
            .env_remove("SQLMAP_MCP_EXIT_POLICY")
            .env_remove("SQLMAP_MCP_LOG_LEVEL")
            .env_remove("SQLMAP_MCP_LOG_DIR")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("server should start");

        let stdin = child.stdin.take().unwrap();
        let stdout = child.stdout.take().unwrap();
        let mut session = Self {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
        };
        session.handshake().await;
        session
    }

    async fn send(&mut self, message: Value) {
        let mut line = serde_json::to_string(&message).unwrap();
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await.unwrap();
        self.stdin.flush().await.unwrap();
    }

    /// Read messages until the response carrying `id` arrives.
    async fn response(&mut self, id: u64) -> Value {
        loop {
            let line = tokio::time::timeout(STEP_TIMEOUT, self.lines.next_line())
                .await
                .expect("server should answer in time")
                .unwrap()
                .expect("server closed stdout early");
            let message: Value = serde_json::from_str(&line).expect("stdout carries only JSON-RPC");
            if message["id"] == json!(id) {
                return message;
            }
        }
    }

    async fn request(&mut self, id: u64, method: &str, params: Value) -> Value {
        self.send(json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await;
        self.response(id).await
    }

    async fn handshake(&mut self) {
        let init = self
            .request(
                0,
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "roundtrip-test", "version": "0.0.0" }
                }),
            )
            .await;
        assert_eq!(init["result"]["serverInfo"]["name"], "sqlmap");
        self.send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
            .await;
    }

    async fn call(&mut self, id: u64, arguments: Value) -> Value {
        self.request(
            id,
            "tools/call",
            json!({ "name": "do-sqlmap", "arguments": arguments }),
        )
        .await
    }

    async fn shutdown(self) {
        let Session {
            mut child, stdin, ..
        } = self;
        drop(stdin);
        let status = tokio::time::timeout(STEP_TIMEOUT, child.wait())
            .await
            .expect("server should exit when stdin closes")
            .unwrap();
        assert!(status.success());
    }
}

fn texts(response: &Value) -> Vec<String> {
    response["result"]["content"]
        .as_array()
        .expect("tool result has content")
        .iter()
        .map(|block| block["text"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn lists_the_do_sqlmap_tool() {
    let tmp = TempDir::new().unwrap();
    let sqlmap = fake_sqlmap(tmp.path(), "exit 0");
    let mut session = Session::start(&sqlmap, &[]).await;

    let listed = session.request(1, "tools/list", json!({})).await;
    let tools = listed["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "do-sqlmap");
    assert!(tools[0]["inputSchema"]["properties"]["url"].is_object());
    assert!(tools[0]["inputSchema"]["properties"]["sqlmap_args"].is_object());

    session.shutdown().await;
}

#[tokio::test]
async fn call_runs_scanner_with_default_batch_flag() {
    let tmp = TempDir::new().unwrap();
    let sqlmap = fake_sqlmap(
        tmp.path(),
        "echo \"args: $*\"\necho \"[WARNING] heuristic test\" >&2\nexit 0",
    );
    let mut session = Session::start(&sqlmap, &[]).await;

    let response = session
        .call(1, json!({ "url": "http://testphp.example/listproducts.php?cat=1" }))
        .await;

    assert_ne!(response["result"]["isError"], json!(true));
    let texts = texts(&response);
    assert_eq!(texts[0], "sqlmap finished with exit code 0");
    assert_eq!(
        texts[1].trim_end(),
        "args: -u http://testphp.example/listproducts.php?cat=1 --batch"
    );
    assert_eq!(texts[2].trim_end(), "stderr:\n[WARNING] heuristic test");

    session.shutdown().await;
}

#[tokio::test]
async fn extra_arguments_replace_the_default_flag() {
    let tmp = TempDir::new().unwrap();
    let sqlmap = fake_sqlmap(tmp.path(), "for arg in \"$@\"; do echo \"[$arg]\"; done");
    let mut session = Session::start(&sqlmap, &[]).await;

    let response = session
        .call(
            1,
            json!({
                "url": "http://target.example/?id=1",
                "sqlmap_args": ["--level", "3", "--risk=2", "--tamper=space2comment; touch pwned"]
            }),
        )
        .await;

    let texts = texts(&response);
    assert_eq!(
        texts[1].trim_end(),
        "[-u]\n[http://target.example/?id=1]\n[--level]\n[3]\n[--risk=2]\n\
         [--tamper=space2comment; touch pwned]"
    );
    assert!(!tmp.path().join("pwned").exists());

    session.shutdown().await;
}

#[tokio::test]
async fn strict_policy_reports_failure_as_tool_error() {
    let tmp = TempDir::new().unwrap();
    let sqlmap = fake_sqlmap(tmp.path(), "echo boom >&2\nexit 1");
    let mut session = Session::start(&sqlmap, &["--exit-policy", "strict"]).await;

    let response = session.call(1, json!({ "url": "http://target.example/" })).await;

    assert_eq!(response["result"]["isError"], json!(true));
    assert!(texts(&response).iter().any(|t| t.contains("boom")));

    session.shutdown().await;
}

#[tokio::test]
async fn hung_scanner_is_killed_after_timeout() {
    let tmp = TempDir::new().unwrap();
    let sqlmap = fake_sqlmap(tmp.path(), "echo started\nexec sleep 60");
    let mut session = Session::start(&sqlmap, &["--timeout", "1"]).await;

    let response = session.call(1, json!({ "url": "http://target.example/" })).await;

    assert_eq!(response["result"]["isError"], json!(true));
    let texts = texts(&response);
    assert!(texts[0].contains("timeout"));
    assert!(texts.iter().any(|t| t.contains("started")));

    session.shutdown().await;
}

#[tokio::test]
async fn malformed_url_is_an_invalid_params_error() {
    let tmp = TempDir::new().unwrap();
    let sqlmap = fake_sqlmap(tmp.path(), "touch \"$(dirname \"$0\")/ran\"");
    let mut session = Session::start(&sqlmap, &[]).await;

    let response = session.call(1, json!({ "url": "definitely not a url" })).await;

    assert_eq!(response["error"]["code"], json!(-32602));
    assert!(!tmp.path().join("ran").exists());

    session.shutdown().await;
}
