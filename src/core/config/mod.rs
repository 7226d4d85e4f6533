pub mod loader;

pub use loader::ConfigLoader;

use crate::core::types::ExitCodePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server configuration loaded from the optional TOML file.
///
/// The `[logging]` table of the same file is read separately by
/// [`crate::logging::config::LoggingConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SqlmapMcpConfig {
    /// Scanner invocation settings
    #[serde(default)]
    pub scanner: ScannerConfig,
}

/// Scanner invocation settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Kill a scan after this many seconds; unset means no limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// How completed scans with a non-zero exit code are reported
    #[serde(default)]
    pub exit_policy: ExitCodePolicy,
}

impl ScannerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
