#![allow(clippy::result_large_err)]

use super::SqlmapMcpConfig;
use crate::core::error::AppError;
use crate::core::types::{ErrorCategory, ExitCodePolicy};
use std::env;
use std::path::Path;

pub const ENV_TIMEOUT_SECS: &str = "SQLMAP_MCP_TIMEOUT_SECS";
pub const ENV_EXIT_POLICY: &str = "SQLMAP_MCP_EXIT_POLICY";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration: defaults, then the config file when one is given,
    /// then environment overrides. The result is validated.
    pub fn load(config_path: Option<&Path>) -> Result<SqlmapMcpConfig, AppError> {
        let mut config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => SqlmapMcpConfig::default(),
        };

        Self::apply_env_overrides(&mut config)?;
        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Read and parse a config file. An explicitly named file must exist.
    pub fn load_from_file(path: &Path) -> Result<SqlmapMcpConfig, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
            .with_code("SQLMAP-CFG-001")
        })?;

        toml::from_str(&content).map_err(|e| {
            AppError::with_source(
                ErrorCategory::ConfigError,
                format!("Failed to parse config file {}", path.display()),
                Box::new(e),
            )
            .with_code("SQLMAP-CFG-001")
        })
    }

    /// Environment variables take precedence over config file values.
    fn apply_env_overrides(config: &mut SqlmapMcpConfig) -> Result<(), AppError> {
        if let Ok(raw) = env::var(ENV_TIMEOUT_SECS) {
            let raw = raw.trim();
            if !raw.is_empty() {
                let secs = raw.parse::<u64>().map_err(|_| {
                    AppError::new(
                        ErrorCategory::ConfigError,
                        format!(
                            "{} must be a whole number of seconds, got '{}'",
                            ENV_TIMEOUT_SECS, raw
                        ),
                    )
                    .with_code("SQLMAP-CFG-001")
                })?;
                config.scanner.timeout_secs = Some(secs);
            }
        }

        if let Ok(raw) = env::var(ENV_EXIT_POLICY) {
            if !raw.trim().is_empty() {
                config.scanner.exit_policy = raw.parse::<ExitCodePolicy>().map_err(|msg| {
                    AppError::new(
                        ErrorCategory::ConfigError,
                        format!("{}: {}", ENV_EXIT_POLICY, msg),
                    )
                    .with_code("SQLMAP-CFG-001")
                })?;
            }
        }

        Ok(())
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "SQLMAP_MCP_TIMEOUT_SECS - Kill scans after this many seconds (default: no limit)",
            "SQLMAP_MCP_EXIT_POLICY - permissive or strict (default: permissive)",
            "SQLMAP_MCP_LOG_LEVEL - Default tracing level when RUST_LOG is unset (default: info)",
            "SQLMAP_MCP_LOG_DIR - Directory for sqlmap-mcp.log; enables the file sink",
        ]
    }

    /// Validate configuration values
    pub fn validate_config(config: &SqlmapMcpConfig) -> Result<(), AppError> {
        if config.scanner.timeout_secs == Some(0) {
            return Err(AppError::new(
                ErrorCategory::ConfigError,
                "scanner.timeout_secs must be greater than zero; omit it to disable the timeout",
            )
            .with_code("SQLMAP-CFG-001"));
        }

        Ok(())
    }
}
