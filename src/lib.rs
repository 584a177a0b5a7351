pub mod bridge;
pub mod config;
pub mod context;
pub mod errors;
pub mod mcp;

use std::sync::Arc;

use bridge::SubprocessWorker;
use context::ServerContext;
use mcp::{McpServer, ToolDispatcher};

/// Builds the dispatcher for a context, backed by a subprocess worker.
pub fn build_dispatcher(ctx: Arc<ServerContext>) -> ToolDispatcher {
    let catalog = ctx.domain.catalog();
    let max_concurrent = ctx.max_concurrent_calls;
    ToolDispatcher::new(catalog, Arc::new(SubprocessWorker::new(ctx)), max_concurrent)
}

/// Builds a complete server instance for a context.
pub fn build_server(ctx: Arc<ServerContext>) -> McpServer {
    let domain = ctx.domain;
    McpServer::new(domain, build_dispatcher(ctx))
}
