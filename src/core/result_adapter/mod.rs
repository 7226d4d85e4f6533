use crate::core::error::AppError;
use crate::core::supervisor::ProcessOutcome;
use crate::core::types::{ErrorCategory, ExitCodePolicy};
use serde::{Deserialize, Serialize};

pub const EMPTY_STDOUT_PLACEHOLDER: &str = "(no standard output)";
pub const STDERR_LABEL: &str = "stderr:\n";
pub const SUCCESS_MARKER: &str = "sqlmap completed successfully";

/// One unit of the response returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            ContentBlock::Text { text } => text,
        }
    }
}

/// Adapted response for one invocation.
#[derive(Debug)]
pub enum ToolResult {
    Success(Vec<ContentBlock>),
    /// The call failed. `output` holds whatever scanner output is worth
    /// showing alongside the error.
    Failure {
        error: AppError,
        output: Vec<ContentBlock>,
    },
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    /// All text in order, with the failure message first for failures.
    pub fn texts(&self) -> Vec<&str> {
        match self {
            ToolResult::Success(blocks) => blocks.iter().map(ContentBlock::as_text).collect(),
            ToolResult::Failure { error, output } => std::iter::once(error.message.as_str())
                .chain(output.iter().map(ContentBlock::as_text))
                .collect(),
        }
    }
}

/// Map a finished invocation to the caller-facing result.
pub fn adapt(outcome: ProcessOutcome, policy: ExitCodePolicy) -> ToolResult {
    match outcome {
        ProcessOutcome::Completed {
            exit_code,
            stdout,
            stderr,
        } => match policy {
            ExitCodePolicy::Permissive => permissive(exit_code, stdout, stderr),
            ExitCodePolicy::Strict => strict(exit_code, stdout, stderr),
        },
        ProcessOutcome::SpawnFailed { reason } => ToolResult::Failure {
            error: AppError::new(
                ErrorCategory::SpawnFailure,
                format!("failed to start sqlmap: {}", reason),
            )
            .with_code("SQLMAP-RUN-001"),
            output: Vec::new(),
        },
        ProcessOutcome::TimedOut {
            limit,
            stdout,
            stderr,
        } => ToolResult::Failure {
            error: AppError::new(
                ErrorCategory::Timeout,
                format!(
                    "sqlmap was killed after exceeding the {} timeout",
                    humantime::format_duration(limit)
                ),
            )
            .with_code("SQLMAP-RUN-003"),
            output: partial_output(stdout, stderr),
        },
        ProcessOutcome::Cancelled { stdout, stderr } => ToolResult::Failure {
            error: AppError::new(ErrorCategory::Cancelled, "sqlmap invocation was cancelled")
                .with_code("SQLMAP-RUN-004"),
            output: partial_output(stdout, stderr),
        },
    }
}

fn permissive(exit_code: i32, stdout: String, stderr: String) -> ToolResult {
    let mut blocks = vec![
        ContentBlock::text(format!("sqlmap finished with exit code {}", exit_code)),
        if stdout.is_empty() {
            ContentBlock::text(EMPTY_STDOUT_PLACEHOLDER)
        } else {
            ContentBlock::text(stdout)
        },
    ];
    if !stderr.is_empty() {
        blocks.push(ContentBlock::text(format!("{}{}", STDERR_LABEL, stderr)));
    }
    ToolResult::Success(blocks)
}

fn strict(exit_code: i32, stdout: String, stderr: String) -> ToolResult {
    if exit_code == 0 {
        return ToolResult::Success(vec![
            ContentBlock::text(stdout),
            ContentBlock::text(stderr),
            ContentBlock::text(SUCCESS_MARKER),
        ]);
    }

    let mut message = format!("sqlmap exited with code {}", exit_code);
    if !stderr.is_empty() {
        message.push_str(": ");
        message.push_str(&stderr);
    }
    ToolResult::Failure {
        error: AppError::new(ErrorCategory::NonZeroExit, message)
            .with_code("SQLMAP-RUN-002")
            .with_context("exit_code", exit_code.to_string()),
        output: if stdout.is_empty() {
            Vec::new()
        } else {
            vec![ContentBlock::text(stdout)]
        },
    }
}

fn partial_output(stdout: String, stderr: String) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    if !stdout.is_empty() {
        blocks.push(ContentBlock::text(stdout));
    }
    if !stderr.is_empty() {
        blocks.push(ContentBlock::text(format!("{}{}", STDERR_LABEL, stderr)));
    }
    blocks
}
