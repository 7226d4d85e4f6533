use serde::{Deserialize, Serialize};

/// Flag appended when the caller supplies no extra arguments: sqlmap's
/// non-interactive batch mode.
pub const DEFAULT_FLAG: &str = "--batch";

/// Flag that introduces the target URL.
pub const TARGET_FLAG: &str = "-u";

/// One caller request, already validated by the tool boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub target: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl InvocationRequest {
    pub fn new(target: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            target: target.into(),
            extra_args,
        }
    }
}

/// Arguments handed to the scanner process, one element per argv slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentVector(Vec<String>);

impl ArgumentVector {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }

    /// Space-joined rendering for diagnostics only. Never passed to a shell.
    pub fn display(&self) -> String {
        self.0.join(" ")
    }
}

impl AsRef<[String]> for ArgumentVector {
    fn as_ref(&self) -> &[String] {
        &self.0
    }
}

/// Build the argument vector: `-u <target>` followed by the extra arguments in
/// order, or by [`DEFAULT_FLAG`] when there are none.
pub fn build(request: &InvocationRequest) -> ArgumentVector {
    let mut argv = Vec::with_capacity(2 + request.extra_args.len().max(1));
    argv.push(TARGET_FLAG.to_string());
    argv.push(request.target.clone());
    if request.extra_args.is_empty() {
        argv.push(DEFAULT_FLAG.to_string());
    } else {
        argv.extend(request.extra_args.iter().cloned());
    }
    ArgumentVector(argv)
}
