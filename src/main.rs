use clap::Parser;
use sqlmap_mcp::{cli, logging};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Args::parse();

    let _guard = match logging::init(args.config.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("sqlmap-mcp: failed to initialize logging: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    match cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("sqlmap-mcp: {err:#}");
            ExitCode::FAILURE
        }
    }
}
