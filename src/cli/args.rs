use crate::core::config::{ConfigLoader, ScannerConfig};
use crate::core::types::ExitCodePolicy;
use clap::Parser;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nARGUMENTS:\n{positionals}\n\
\nOPTIONS:\n{options}\n\
{after-help}";

const EXAMPLES: &str = "\
EXAMPLES:\n    \
sqlmap-mcp\n    \
sqlmap-mcp /opt/sqlmap/sqlmap.py --timeout 900\n    \
sqlmap-mcp --config sqlmap-mcp.toml --exit-policy strict\n";

fn long_after_help() -> String {
    format!(
        "{EXAMPLES}\nENVIRONMENT:\n    {}\n",
        ConfigLoader::env_var_documentation().join("\n    ")
    )
}

#[derive(Parser, Debug)]
#[command(name = "sqlmap-mcp")]
#[command(version = crate::VERSION)]
#[command(about = "MCP stdio server exposing a local sqlmap installation as the do-sqlmap tool")]
#[command(help_template = HELP_TEMPLATE)]
#[command(after_help = EXAMPLES)]
#[command(after_long_help = long_after_help())]
pub struct Args {
    /// Path to the sqlmap executable (default: search PATH for `sqlmap`)
    #[arg(value_name = "SQLMAP_PATH")]
    pub sqlmap_path: Option<PathBuf>,

    /// TOML configuration file with [scanner] and [logging] sections
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Kill a scan that runs longer than this many seconds
    #[arg(long, value_name = "SECS", help_heading = "Scanner Overrides")]
    pub timeout: Option<u64>,

    /// How a non-zero sqlmap exit code is reported
    #[arg(
        long,
        value_enum,
        value_name = "POLICY",
        help_heading = "Scanner Overrides"
    )]
    pub exit_policy: Option<ExitCodePolicy>,
}

impl Args {
    /// Apply command line overrides on top of file and environment settings.
    pub fn apply_overrides(&self, scanner: &mut ScannerConfig) {
        if let Some(timeout) = self.timeout {
            scanner.timeout_secs = Some(timeout);
        }
        if let Some(policy) = self.exit_policy {
            scanner.exit_policy = policy;
        }
    }
}
