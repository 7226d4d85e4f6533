//! MCP surface: the `do-sqlmap` tool and the stdio serving loop.

use crate::core::config::ScannerConfig;
use crate::core::error::AppError;
use crate::core::invocation::{self, InvocationRequest};
use crate::core::resolver::ExecutableLocation;
use crate::core::result_adapter::{self, ToolResult};
use crate::core::supervisor::{RunLimits, ScanRunner};
use crate::core::types::ErrorCategory;
use anyhow::{anyhow, Context};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use rmcp::ServiceExt;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Name reported in the MCP handshake.
pub const SERVER_NAME: &str = "sqlmap";

const INSTRUCTIONS: &str = "Runs the locally installed sqlmap against a target URL. \
Call do-sqlmap with `url` and optionally `sqlmap_args`; \
without extra arguments sqlmap runs with --batch. \
Only scan targets you are authorized to test.";

/// State shared by every tool call. Built once at startup and never mutated.
pub struct ServerContext {
    pub location: ExecutableLocation,
    pub scanner: ScannerConfig,
    pub runner: Arc<dyn ScanRunner>,
    /// Cancelled when the server shuts down; every scan listens to a child of it.
    pub shutdown: CancellationToken,
}

impl ServerContext {
    pub fn new(
        location: ExecutableLocation,
        scanner: ScannerConfig,
        runner: Arc<dyn ScanRunner>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            location,
            scanner,
            runner,
            shutdown,
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DoSqlmapRequest {
    /// Target URL passed to sqlmap with -u
    #[schemars(description = "Target URL to test, passed to sqlmap as -u <url>")]
    pub url: String,

    /// Extra sqlmap arguments
    #[serde(default)]
    #[schemars(
        description = "Additional sqlmap arguments, passed verbatim and in order. \
            Defaults to [\"--batch\"] when omitted or empty."
    )]
    pub sqlmap_args: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct SqlmapServer {
    ctx: Arc<ServerContext>,
    tool_router: ToolRouter<Self>,
}

impl SqlmapServer {
    pub fn new(ctx: ServerContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            tool_router: Self::tool_router(),
        }
    }

    /// Run one scan end to end. `request_cancel` fires when the client
    /// cancels this particular call.
    pub async fn execute(
        &self,
        request: DoSqlmapRequest,
        request_cancel: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        validate_target(&request.url)?;

        let invocation =
            InvocationRequest::new(request.url, request.sqlmap_args.unwrap_or_default());
        let argv = invocation::build(&invocation);
        info!(
            executable = %self.ctx.location.path.display(),
            argv = %argv.display(),
            "starting sqlmap"
        );

        let cancel = self.ctx.shutdown.child_token();
        let link = tokio::spawn(link_cancellation(request_cancel, cancel.clone()));
        let limits = RunLimits::new(self.ctx.scanner.timeout(), cancel);

        let outcome = self
            .ctx
            .runner
            .run(&self.ctx.location, &argv, limits)
            .await;
        link.abort();
        debug!(outcome = outcome.label(), "sqlmap invocation finished");

        Ok(into_call_result(result_adapter::adapt(
            outcome,
            self.ctx.scanner.exit_policy,
        )))
    }
}

#[tool_router]
impl SqlmapServer {
    #[tool(
        name = "do-sqlmap",
        description = "Run sqlmap against a target URL and return its output"
    )]
    pub async fn do_sqlmap(
        &self,
        Parameters(request): Parameters<DoSqlmapRequest>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.execute(request, context.ct).await
    }
}

#[tool_handler]
impl ServerHandler for SqlmapServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.into(),
                version: crate::VERSION.into(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }
}

/// Serve MCP over stdin/stdout until the client disconnects or Ctrl-C.
///
/// In-flight scans are cancelled through `shutdown` on the way out.
pub async fn serve_stdio(
    server: SqlmapServer,
    shutdown: CancellationToken,
) -> crate::Result<()> {
    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|err| anyhow!("failed to start MCP stdio transport: {err}"))?;
    info!("serving MCP over stdio");

    let transport_cancel = service.cancellation_token();
    let waiting = service.waiting();
    tokio::pin!(waiting);

    let finished = tokio::select! {
        result = &mut waiting => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            transport_cancel.cancel();
            waiting.await
        }
    };
    shutdown.cancel();

    let reason = finished.context("MCP service task failed")?;
    info!(?reason, "MCP session ended");
    Ok(())
}

async fn link_cancellation(request_cancel: CancellationToken, scan_cancel: CancellationToken) {
    tokio::select! {
        _ = request_cancel.cancelled() => {
            info!("client cancelled the request");
            scan_cancel.cancel();
        }
        _ = scan_cancel.cancelled() => {}
    }
}

fn validate_target(url: &str) -> Result<(), McpError> {
    if let Err(err) = url::Url::parse(url) {
        let error = AppError::new(
            ErrorCategory::MalformedInput,
            format!("invalid url '{url}': {err}"),
        )
        .with_code("SQLMAP-REQ-001")
        .with_context("url", url);
        warn!(code = %error.code, "{}", error.message);
        return Err(McpError::invalid_params(
            error.message,
            Some(json!({ "code": error.code, "url": url })),
        ));
    }
    Ok(())
}

fn into_call_result(result: ToolResult) -> CallToolResult {
    let content: Vec<Content> = result.texts().into_iter().map(Content::text).collect();
    match &result {
        ToolResult::Success(_) => CallToolResult::success(content),
        ToolResult::Failure { error, .. } => {
            warn!(code = %error.code, category = %error.category, "{}", error.message);
            CallToolResult::error(content)
        }
    }
}
