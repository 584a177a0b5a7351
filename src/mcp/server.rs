//! MCP server that reads JSON-RPC 2.0 messages from stdin and writes
//! responses to stdout.
//!
//! Requests are handled strictly one at a time: a `tools/call` blocks the
//! loop until the backend finishes. Only protocol messages are written to
//! the output stream; all diagnostics go through `tracing` to stderr.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::errors::{BridgeError, Result};

use super::catalog::Domain;
use super::dispatcher::ToolDispatcher;
use super::transport::{
    CallToolParams, ErrorCode, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION,
};

/// Runtime statistics for the MCP server.
pub struct ServerStats {
    started_at: Instant,
    total_requests: AtomicU64,
    tool_calls: AtomicU64,
    tool_errors: AtomicU64,
    protocol_errors: AtomicU64,
}

impl ServerStats {
    fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_requests: AtomicU64::new(0),
            tool_calls: AtomicU64::new(0),
            tool_errors: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
        }
    }
}

/// One bridge instance: a domain's catalog served over a line-oriented channel.
pub struct McpServer {
    domain: Domain,
    dispatcher: ToolDispatcher,
    stats: ServerStats,
    tool_call_counts: Mutex<HashMap<String, u64>>,
}

impl McpServer {
    pub fn new(domain: Domain, dispatcher: ToolDispatcher) -> Self {
        Self {
            domain,
            dispatcher,
            stats: ServerStats::new(),
            tool_call_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Serves the process's stdin/stdout until stdin is closed.
    pub async fn run(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serves newline-delimited JSON-RPC from `reader`, answering on `writer`.
    ///
    /// Fails only if the very first read fails, i.e. the transport could not
    /// be established. Later I/O errors end the session cleanly. Malformed
    /// lines, including invalid UTF-8, are answered in-band.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(
            server = self.domain.server_name(),
            tools = self.dispatcher.catalog().len(),
            "MCP server running on stdio"
        );
        let mut buf = Vec::new();
        let mut connected = false;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if !connected => {
                    return Err(BridgeError::Transport {
                        message: format!("failed to read from input stream: {}", e),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "input stream failed, shutting down");
                    break;
                }
            }
            connected = true;

            if buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let response = match parse_message(&buf) {
                Ok(request) => self.handle_request(request).await,
                Err(rejected) => {
                    self.stats.protocol_errors.fetch_add(1, Ordering::Relaxed);
                    Some(rejected)
                }
            };

            if let Some(resp) = response {
                if let Err(e) = write_response(&mut writer, &resp).await {
                    error!(error = %e, "failed to write response, shutting down");
                    break;
                }
            }
        }

        info!(stats = %self.server_stats_json(), "MCP server shutting down");
        Ok(())
    }

    /// Dispatches a parsed JSON-RPC request to the appropriate handler.
    ///
    /// Returns `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
        let id = request.id;
        debug!(method = %request.method, "request received");

        let response = match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(id)),
            "initialized" | "notifications/initialized" => None,
            "tools/list" => Some(self.handle_tools_list(id)),
            "tools/call" => Some(self.handle_tools_call(id, request.params).await),
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            method if method.starts_with("notifications/") => None,
            _ => Some(JsonRpcResponse::error(
                id,
                ErrorCode::MethodNotFound,
                format!("method not found: {}", request.method),
            )),
        };

        if response.as_ref().is_some_and(JsonRpcResponse::is_error) {
            self.stats.protocol_errors.fetch_add(1, Ordering::Relaxed);
        }
        response
    }

    fn handle_initialize(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": self.domain.server_name(),
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let tools = self.dispatcher.catalog().list_tools();
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(
                id,
                ErrorCode::InvalidParams,
                "missing params for tools/call".to_string(),
            );
        };
        let params: CallToolParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    ErrorCode::InvalidParams,
                    format!("invalid tools/call params: {}", e),
                );
            }
        };

        self.stats.tool_calls.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut counts) = self.tool_call_counts.lock() {
            *counts.entry(params.name.clone()).or_insert(0) += 1;
        }

        let result = self.dispatcher.dispatch(&params.name, params.arguments).await;
        if result.is_error {
            self.stats.tool_errors.fetch_add(1, Ordering::Relaxed);
        }

        match serde_json::to_value(&result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(
                id,
                ErrorCode::InternalError,
                format!("failed to serialize tool result: {}", e),
            ),
        }
    }

    /// Returns the current server runtime statistics as a JSON value.
    pub fn server_stats_json(&self) -> Value {
        let tool_counts: Value = self
            .tool_call_counts
            .lock()
            .map(|counts| json!(*counts))
            .unwrap_or(json!({}));

        json!({
            "server": self.domain.server_name(),
            "uptime_secs": self.stats.started_at.elapsed().as_secs(),
            "total_requests": self.stats.total_requests.load(Ordering::Relaxed),
            "tool_calls": self.stats.tool_calls.load(Ordering::Relaxed),
            "tool_errors": self.stats.tool_errors.load(Ordering::Relaxed),
            "protocol_errors": self.stats.protocol_errors.load(Ordering::Relaxed),
            "tool_call_counts": tool_counts,
        })
    }
}

/// Parses one input line, or builds the error response it deserves.
///
/// Bytes that are not UTF-8 or not JSON are a parse error with a null id.
/// Well-formed JSON that is not a JSON-RPC 2.0 request is an invalid
/// request, answered with its id when one can be read.
fn parse_message(line: &[u8]) -> std::result::Result<JsonRpcRequest, JsonRpcResponse> {
    let parse_error = |detail: String| {
        JsonRpcResponse::error(
            Value::Null,
            ErrorCode::ParseError,
            format!("failed to parse JSON-RPC request: {}", detail),
        )
    };
    let text = std::str::from_utf8(line).map_err(|e| parse_error(e.to_string()))?;
    let value: Value = serde_json::from_str(text).map_err(|e| parse_error(e.to_string()))?;

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    if value.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(JsonRpcResponse::error(
            id,
            ErrorCode::InvalidRequest,
            "invalid request: jsonrpc must be \"2.0\"".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::error(id, ErrorCode::InvalidRequest, format!("invalid request: {}", e))
    })
}

/// Writes one response as a single line and flushes it.
async fn write_response<W>(writer: &mut W, response: &JsonRpcResponse) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}
