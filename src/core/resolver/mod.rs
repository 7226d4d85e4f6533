#![allow(clippy::result_large_err)]

//! Locates the sqlmap executable once, before the server accepts requests.

use crate::core::error::AppError;
use crate::core::types::{ErrorCategory, LocationSource};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Canonical binary name searched for on PATH.
pub const SQLMAP_BINARY: &str = "sqlmap";

/// Resolved scanner location. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableLocation {
    pub path: PathBuf,
    pub source: LocationSource,
}

impl ExecutableLocation {
    pub fn explicit(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source: LocationSource::Explicit,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("{name} was not found on PATH")]
    NotFound { name: String },
    #[error("PATH lookup for {name} failed: {reason}")]
    Failed { name: String, reason: String },
}

/// Operating-system PATH search for an executable name.
pub trait PathLookup: Send + Sync {
    fn lookup(&self, name: &str) -> Result<PathBuf, LookupError>;
}

/// PATH search backed by the `which` crate, which applies the platform's
/// executable rules (PATHEXT on Windows, the executable bit on Unix).
#[derive(Debug, Clone, Default)]
pub struct WhichLookup {
    search_path: Option<OsString>,
}

impl WhichLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search the given PATH-formatted list instead of the process `PATH`.
    pub fn in_paths(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }
}

impl PathLookup for WhichLookup {
    fn lookup(&self, name: &str) -> Result<PathBuf, LookupError> {
        let found = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().map_err(|err| LookupError::Failed {
                    name: name.to_string(),
                    reason: err.to_string(),
                })?;
                which::which_in(name, Some(paths), cwd)
            }
            None => which::which(name),
        };

        found.map_err(|err| {
            if matches!(err, which::Error::CannotFindBinaryPath) {
                LookupError::NotFound {
                    name: name.to_string(),
                }
            } else {
                LookupError::Failed {
                    name: name.to_string(),
                    reason: err.to_string(),
                }
            }
        })
    }
}

/// Resolve the scanner executable.
///
/// An explicit path that exists is returned unchanged and no PATH search is
/// performed. A missing explicit path is reported and resolution falls back to
/// the PATH search. Failing both yields an `ExecutableNotFound` error, which
/// callers treat as fatal.
pub fn resolve(
    explicit: Option<&Path>,
    lookup: &dyn PathLookup,
) -> Result<ExecutableLocation, AppError> {
    if let Some(path) = explicit {
        if path.exists() {
            tracing::info!(path = %path.display(), "using explicitly provided sqlmap path");
            return Ok(ExecutableLocation::explicit(path));
        }
        tracing::warn!(
            path = %path.display(),
            "explicit sqlmap path does not exist, falling back to PATH lookup"
        );
    }

    match lookup.lookup(SQLMAP_BINARY) {
        Ok(found) if found.exists() => {
            tracing::info!(path = %found.display(), "found sqlmap on PATH");
            Ok(ExecutableLocation {
                path: found,
                source: LocationSource::PathLookup,
            })
        }
        Ok(found) => Err(not_found(explicit)
            .with_context("lookup_result", found.display().to_string())),
        Err(err) => {
            tracing::error!("{}", err);
            Err(not_found(explicit).with_context("lookup_error", err.to_string()))
        }
    }
}

fn not_found(explicit: Option<&Path>) -> AppError {
    let mut error = AppError::new(
        ErrorCategory::ExecutableNotFound,
        "unable to locate sqlmap; pass its path as the first argument or add it to PATH",
    )
    .with_code("SQLMAP-RES-001");
    if let Some(path) = explicit {
        error.add_context("explicit_path", &path.display().to_string());
    }
    error
}
