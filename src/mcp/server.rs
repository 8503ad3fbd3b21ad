/// MCP Server setup using `rmcp` with stdio transport.
///
/// Provides `McpContext` (shared state) and `McpServer` (startup logic).
use crate::mcp::tools::AppTools;
use anyhow::{Context, Result};
use rmcp::{ServiceExt, handler::server::router::Router, transport::io::stdio};
use std::sync::Arc;
use tracing::info;

use crate::{app::AppContext, session::ChatSession};
use tokio::sync::Mutex as TokioMutex;

/// State shared by all tool handlers: the pipelines and one chat session.
#[derive(Clone)]
pub struct McpContext {
    pub app: AppContext,
    pub session: Arc<TokioMutex<ChatSession>>,
}

impl McpContext {
    pub fn new(app: AppContext, session: ChatSession) -> Self {
        Self {
            app,
            session: Arc::new(TokioMutex::new(session)),
        }
    }
}

/// MCP Server wrapping the context and serving via stdio.
#[derive(Clone)]
pub struct McpServer {
    pub ctx: McpContext,
}

impl McpServer {
    pub fn new(ctx: McpContext) -> Self {
        Self { ctx }
    }

    /// Serve on stdio until the client disconnects.
    pub async fn start(self) -> Result<()> {
        info!(
            "Starting MCP server on stdio (collection: {})",
            self.ctx.app.config.collection_name
        );
        let (stdin, stdout) = stdio();

        let app_tools = AppTools::new(self.ctx.clone());
        let router = Router::new(app_tools.clone()).with_tools(app_tools.tool_router.clone());

        router
            .serve((stdin, stdout))
            .await
            .context("MCP server failed to start on stdio")?
            .waiting()
            .await
            .context("MCP server encountered an error during stdio transport")?;

        Ok(())
    }
}
