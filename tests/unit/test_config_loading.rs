use clap::Parser;
use serial_test::serial;
use sqlmap_mcp::cli::Args;
use sqlmap_mcp::core::config::loader::{ENV_EXIT_POLICY, ENV_TIMEOUT_SECS};
use sqlmap_mcp::core::{ConfigLoader, ErrorCategory, ExitCodePolicy};
use sqlmap_mcp::logging::config::{LoggingConfig, ENV_LOG_DIR, ENV_LOG_LEVEL};
use sqlmap_mcp::logging::ConsoleOutput;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

const FULL_CONFIG: &str = r#"
[scanner]
timeout_secs = 900
exit_policy = "strict"

[logging]
default_level = "debug"
enable_file = true
log_dir = "/var/log/sqlmap-mcp"
console_output = "none"
"#;

fn clear_env() {
    for key in [ENV_TIMEOUT_SECS, ENV_EXIT_POLICY, ENV_LOG_LEVEL, ENV_LOG_DIR] {
        env::remove_var(key);
    }
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("sqlmap-mcp.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
#[serial]
fn one_file_feeds_scanner_and_logging() {
    clear_env();
    let tmp = TempDir::new().unwrap();
    let path = write_config(&tmp, FULL_CONFIG);

    let config = ConfigLoader::load(Some(&path)).unwrap();
    assert_eq!(config.scanner.timeout(), Some(Duration::from_secs(900)));
    assert_eq!(config.scanner.exit_policy, ExitCodePolicy::Strict);

    let logging = LoggingConfig::load(Some(&path)).unwrap();
    assert_eq!(logging.default_level, "debug");
    assert!(logging.enable_file);
    assert_eq!(logging.log_dir, Some(PathBuf::from("/var/log/sqlmap-mcp")));
    assert_eq!(logging.console_output, ConsoleOutput::None);
}

#[test]
#[serial]
fn precedence_is_defaults_then_file_then_env_then_cli() {
    clear_env();
    let tmp = TempDir::new().unwrap();
    let path = write_config(&tmp, "[scanner]\ntimeout_secs = 900\nexit_policy = \"strict\"\n");

    env::set_var(ENV_TIMEOUT_SECS, "300");
    let mut config = ConfigLoader::load(Some(&path)).unwrap();
    clear_env();
    assert_eq!(config.scanner.timeout_secs, Some(300));
    assert_eq!(config.scanner.exit_policy, ExitCodePolicy::Strict);

    let args = Args::parse_from([
        "sqlmap-mcp",
        "--timeout",
        "60",
        "--exit-policy",
        "permissive",
    ]);
    args.apply_overrides(&mut config.scanner);
    assert_eq!(config.scanner.timeout_secs, Some(60));
    assert_eq!(config.scanner.exit_policy, ExitCodePolicy::Permissive);
}

#[test]
#[serial]
fn defaults_are_permissive_without_timeout() {
    clear_env();
    let config = ConfigLoader::load(None).unwrap();
    assert_eq!(config.scanner.exit_policy, ExitCodePolicy::Permissive);
    assert_eq!(config.scanner.timeout(), None);
}

#[test]
#[serial]
fn unknown_exit_policy_in_env_is_a_config_error() {
    clear_env();
    env::set_var(ENV_EXIT_POLICY, "sometimes");
    let err = ConfigLoader::load(None).unwrap_err();
    clear_env();

    assert_eq!(err.category, ErrorCategory::ConfigError);
    assert!(err.message.contains(ENV_EXIT_POLICY));
}

#[test]
#[serial]
fn logging_ignores_missing_config_file() {
    clear_env();
    let tmp = TempDir::new().unwrap();
    let logging = LoggingConfig::load(Some(&tmp.path().join("absent.toml"))).unwrap();
    assert_eq!(logging, LoggingConfig::default());
}

#[test]
fn env_documentation_covers_every_variable() {
    let docs = ConfigLoader::env_var_documentation().join("\n");
    for key in [ENV_TIMEOUT_SECS, ENV_EXIT_POLICY, ENV_LOG_LEVEL, ENV_LOG_DIR] {
        assert!(docs.contains(key), "missing {key}");
    }
}
