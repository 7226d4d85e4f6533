pub mod config;
pub mod error;
pub mod invocation;
pub mod resolver;
pub mod result_adapter;
pub mod supervisor;
pub mod types;

pub use config::{ConfigLoader, ScannerConfig, SqlmapMcpConfig};
pub use error::AppError;
pub use invocation::{ArgumentVector, InvocationRequest};
pub use resolver::{ExecutableLocation, PathLookup, WhichLookup};
pub use result_adapter::{ContentBlock, ToolResult};
pub use supervisor::{ProcessOutcome, RunLimits, ScanRunner, TokioScanRunner};
pub use types::*;
