//! MCP (Model Context Protocol) server for the backend tool domains.
//!
//! Provides a JSON-RPC 2.0 interface over stdio that advertises a fixed
//! tool catalog per domain and forwards each call to the backend
//! interpreter through the bridge.

/// Domain enumeration and the per-domain tool catalogs.
pub mod catalog;

/// Argument validation and worker invocation.
pub mod dispatcher;

/// MCP server implementation.
pub mod server;

/// Tool definitions and the catalog type.
pub mod tools;

/// JSON-RPC 2.0 and tool-result wire types.
pub mod transport;

pub use catalog::Domain;
pub use dispatcher::{validate_arguments, ToolDispatcher};
pub use server::McpServer;
pub use tools::{ParamSpec, ParamType, ToolCatalog, ToolDefinition};
pub use transport::{ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolCallResult};
