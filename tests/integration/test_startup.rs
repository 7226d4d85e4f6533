use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::{contains, starts_with};
use std::fs;
use tempfile::TempDir;

const BIN: &str = "sqlmap-mcp";

fn isolated_command(path_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin(BIN).expect("binary should build");
    cmd.env("PATH", path_dir.path())
        .env_remove("RUST_LOG")
        .env_remove("SQLMAP_MCP_TIMEOUT_SECS")
        .env_remove("SQLMAP_MCP_EXIT_POLICY")
        .env_remove("SQLMAP_MCP_LOG_LEVEL")
        .env_remove("SQLMAP_MCP_LOG_DIR");
    cmd
}

#[test]
fn version_flag_prints_crate_version() {
    Command::cargo_bin(BIN)
        .expect("binary should build")
        .arg("--version")
        .assert()
        .success()
        .stdout(starts_with(format!("{BIN} {}", sqlmap_mcp::VERSION)));
}

#[test]
fn help_lists_arguments_and_environment() {
    Command::cargo_bin(BIN)
        .expect("binary should build")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("SQLMAP_PATH"))
        .stdout(contains("--exit-policy"))
        .stdout(contains("SQLMAP_MCP_TIMEOUT_SECS"));
}

#[test]
fn missing_executable_exits_before_serving() {
    let empty_path = TempDir::new().unwrap();

    isolated_command(&empty_path)
        .arg(empty_path.path().join("no-such-sqlmap"))
        .write_stdin("")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(contains("unable to locate sqlmap"));
}

#[test]
fn missing_executable_without_explicit_path_fails() {
    let empty_path = TempDir::new().unwrap();

    isolated_command(&empty_path)
        .write_stdin("")
        .assert()
        .failure()
        .stderr(contains("SQLMAP-RES-001"));
}

#[test]
fn zero_timeout_flag_is_rejected() {
    let empty_path = TempDir::new().unwrap();

    isolated_command(&empty_path)
        .args(["--timeout", "0"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(contains("timeout_secs"));
}

#[test]
fn unreadable_config_file_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("sqlmap-mcp.toml");
    fs::write(&config, "[scanner]\nexit_policy = \"sometimes\"\n").unwrap();

    isolated_command(&tmp)
        .arg("--config")
        .arg(&config)
        .write_stdin("")
        .assert()
        .failure()
        .stderr(contains("SQLMAP-CFG-001"));
}

#[test]
fn startup_failure_is_reported_once() {
    let empty_path = TempDir::new().unwrap();

    let output = isolated_command(&empty_path)
        .write_stdin("")
        .output()
        .expect("binary should run");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stderr.matches("unable to locate sqlmap").count(), 1);
}
