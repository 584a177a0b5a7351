use std::sync::Arc;

use async_trait::async_trait;
use bidbridge::bridge::ExternalWorker;
use bidbridge::errors::{BridgeError, Result};
use bidbridge::mcp::{Domain, JsonRpcResponse, McpServer, ToolDispatcher};
use serde_json::{json, Map, Value};
use tokio::io::BufReader;

/// Echoes the call back, or fails the way a backend would for `boom`.
struct EchoWorker;

#[async_trait]
impl ExternalWorker for EchoWorker {
    async fn invoke(&self, method: &str, args: &Map<String, Value>) -> Result<Value> {
        if args.get("query").and_then(Value::as_str) == Some("boom") {
            return Err(BridgeError::Backend {
                message: "ollama unavailable".to_string(),
            });
        }
        Ok(json!({ "method": method, "args": args }))
    }
}

fn server(domain: Domain) -> McpServer {
    let dispatcher = ToolDispatcher::new(domain.catalog(), Arc::new(EchoWorker), 2);
    McpServer::new(domain, dispatcher)
}

async fn exchange(server: &McpServer, input: &str) -> Vec<JsonRpcResponse> {
    exchange_bytes(server, input.as_bytes()).await
}

async fn exchange_bytes(server: &McpServer, input: &[u8]) -> Vec<JsonRpcResponse> {
    let mut out: Vec<u8> = Vec::new();
    server
        .serve(BufReader::new(input), &mut out)
        .await
        .unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn lines(messages: &[Value]) -> String {
    messages
        .iter()
        .map(|m| format!("{}\n", m))
        .collect()
}

fn ping(id: u64) -> Vec<u8> {
    lines(&[json!({"jsonrpc": "2.0", "id": id, "method": "ping"})]).into_bytes()
}

#[tokio::test]
async fn test_handshake_and_listing() {
    let server = server(Domain::KnowledgeBase);
    let input = lines(&[
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
    ]);

    let responses = exchange(&server, &input).await;
    assert_eq!(responses.len(), 2, "notifications must not be answered");

    let init = responses[0].result.as_ref().unwrap();
    assert_eq!(init["serverInfo"]["name"], "knowledge-base-mcp");
    assert!(init["capabilities"]["tools"].is_object());

    let tools = responses[1].result.as_ref().unwrap()["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec![
            "search_knowledge",
            "add_knowledge_entry",
            "get_knowledge_entry",
            "list_knowledge_entries",
            "delete_knowledge_entry",
            "get_knowledge_statistics",
            "search_knowledge_semantic",
            "reindex_embeddings",
        ]
    );
    assert_eq!(tools[0]["inputSchema"]["properties"]["limit"]["default"], 10);
}

#[tokio::test]
async fn test_tool_call_success_and_in_band_failures() {
    let server = server(Domain::KnowledgeBase);
    let input = lines(&[
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
               "params": {"name": "search_knowledge", "arguments": {"query": "budget"}}}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
               "params": {"name": "search_knowledge", "arguments": {"query": "boom"}}}),
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
               "params": {"name": "no_such_tool", "arguments": {}}}),
    ]);

    let responses = exchange(&server, &input).await;
    assert_eq!(responses.len(), 3);
    assert!(responses.iter().all(|r| r.error.is_none()), "tool failures are in-band");

    let ok = responses[0].result.as_ref().unwrap();
    assert_eq!(ok["isError"], false);
    let payload: Value = serde_json::from_str(ok["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(payload["args"]["limit"], 10);
    assert_eq!(payload["args"]["min_score"], 0.0);

    let backend = responses[1].result.as_ref().unwrap();
    assert_eq!(backend["isError"], true);
    assert_eq!(backend["content"][0]["text"], "Error: ollama unavailable");

    let unknown = responses[2].result.as_ref().unwrap();
    assert_eq!(unknown["isError"], true);
    assert_eq!(responses[2].id, json!(3));

    let stats = server.server_stats_json();
    assert_eq!(stats["tool_calls"], 3);
    assert_eq!(stats["tool_errors"], 2);
    assert_eq!(stats["tool_call_counts"]["search_knowledge"], 2);
}

#[tokio::test]
async fn test_protocol_errors() {
    let server = server(Domain::DocumentParser);
    let mut input = String::from("this is not json\n\n   \n");
    input.push_str(&lines(&[
        json!({"jsonrpc": "2.0", "id": "a", "method": "resources/list"}),
        json!({"jsonrpc": "2.0", "id": "b", "method": "tools/call"}),
        json!({"jsonrpc": "2.0", "id": "c", "method": "tools/call", "params": {"arguments": {}}}),
        json!({"jsonrpc": "2.0", "id": "d", "method": "ping"}),
    ]));

    let responses = exchange(&server, &input).await;
    assert_eq!(responses.len(), 5, "blank lines are skipped");

    assert_eq!(responses[0].error.as_ref().unwrap().code, -32700);
    assert!(responses[0].id.is_null());
    assert_eq!(responses[1].error.as_ref().unwrap().code, -32601);
    assert_eq!(responses[2].error.as_ref().unwrap().code, -32602);
    assert_eq!(responses[3].error.as_ref().unwrap().code, -32602);
    assert_eq!(responses[4].result, Some(json!({})));
    assert_eq!(responses[4].id, json!("d"));
}

#[tokio::test]
async fn test_empty_input_shuts_down_cleanly() {
    let server = server(Domain::LogicLearning);
    let responses = exchange(&server, "").await;
    assert!(responses.is_empty());
    assert_eq!(server.server_stats_json()["total_requests"], 0);
}

#[tokio::test]
async fn test_invalid_utf8_line_answered_in_band() {
    let server = server(Domain::DocumentParser);
    let mut input = ping(1);
    input.extend_from_slice(b"\xff\xfe garbage\n");
    input.extend_from_slice(&ping(2));

    let responses = exchange_bytes(&server, &input).await;
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0].id, json!(1));
    assert_eq!(responses[1].error.as_ref().unwrap().code, -32700);
    assert!(responses[1].id.is_null());
    assert_eq!(responses[2].id, json!(2));
    assert_eq!(responses[2].result, Some(json!({})));
}

#[tokio::test]
async fn test_invalid_utf8_first_line_is_not_fatal() {
    let server = server(Domain::KnowledgeBase);
    let mut input = b"\xc3\x28\n".to_vec();
    input.extend_from_slice(&ping(7));

    let responses = exchange_bytes(&server, &input).await;
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].error.as_ref().unwrap().code, -32700);
    assert_eq!(responses[1].id, json!(7));
}

#[tokio::test]
async fn test_non_jsonrpc_messages_are_invalid_requests() {
    let server = server(Domain::LogicLearning);
    let input = lines(&[
        json!({"id": 1, "method": "ping"}),
        json!({"jsonrpc": "1.0", "id": 2, "method": "ping"}),
        json!({"jsonrpc": "2.0", "id": 3}),
        json!([1, 2, 3]),
        json!({"jsonrpc": "2.0", "id": 4, "method": "ping"}),
    ]);

    let responses = exchange(&server, &input).await;
    assert_eq!(responses.len(), 5);
    for (resp, id) in responses[..3].iter().zip([json!(1), json!(2), json!(3)]) {
        assert_eq!(resp.error.as_ref().unwrap().code, -32600);
        assert_eq!(resp.id, id);
    }
    assert_eq!(responses[3].error.as_ref().unwrap().code, -32600);
    assert!(responses[3].id.is_null());
    assert!(responses[4].error.is_none());
    assert_eq!(server.server_stats_json()["protocol_errors"], 4);
}
