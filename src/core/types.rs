use serde::{Deserialize, Serialize};

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    ExecutableNotFound,
    SpawnFailure,
    NonZeroExit,
    Timeout,
    Cancelled,
    MalformedInput,
    ConfigError,
    IoError,
    InternalError,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error severity enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Fatal,
    Error,
    Warning,
}

/// How the scanner binary was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationSource {
    Explicit,
    PathLookup,
}

impl std::fmt::Display for LocationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationSource::Explicit => write!(f, "explicit"),
            LocationSource::PathLookup => write!(f, "path-lookup"),
        }
    }
}

/// Mapping applied to a completed scan's exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExitCodePolicy {
    /// Every completed scan is a successful tool call; the exit code is reported in the text.
    #[default]
    Permissive,
    /// Only exit code 0 is a successful tool call.
    Strict,
}

impl std::fmt::Display for ExitCodePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCodePolicy::Permissive => write!(f, "permissive"),
            ExitCodePolicy::Strict => write!(f, "strict"),
        }
    }
}

impl std::str::FromStr for ExitCodePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "permissive" => Ok(ExitCodePolicy::Permissive),
            "strict" => Ok(ExitCodePolicy::Strict),
            _ => Err(format!(
                "invalid exit policy '{}'; supported values are permissive, strict",
                value
            )),
        }
    }
}
