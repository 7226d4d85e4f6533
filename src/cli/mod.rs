pub mod args;

pub use args::Args;

use crate::core::config::ConfigLoader;
use crate::core::resolver::{self, WhichLookup};
use crate::core::supervisor::TokioScanRunner;
use crate::server::{self, ServerContext, SqlmapServer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Load settings, locate sqlmap and serve until the client goes away.
///
/// Any error returned before serving starts is a startup failure.
pub async fn run(args: Args) -> crate::Result<()> {
    let mut config = ConfigLoader::load(args.config.as_deref())?;
    args.apply_overrides(&mut config.scanner);
    ConfigLoader::validate_config(&config)?;

    let location = resolver::resolve(args.sqlmap_path.as_deref(), &WhichLookup::new())?;
    info!(
        path = %location.path.display(),
        source = %location.source,
        exit_policy = %config.scanner.exit_policy,
        timeout_secs = ?config.scanner.timeout_secs,
        "sqlmap executable resolved"
    );

    let shutdown = CancellationToken::new();
    let server = SqlmapServer::new(ServerContext::new(
        location,
        config.scanner,
        Arc::new(TokioScanRunner),
        shutdown.clone(),
    ));
    server::serve_stdio(server, shutdown).await
}
