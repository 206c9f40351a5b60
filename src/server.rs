//! MCP server over stdio
//!
//! Line-delimited JSON-RPC 2.0: requests arrive on stdin, responses leave on
//! stdout, diagnostics go to stderr via tracing. Requests are handled one at
//! a time; the registry is read-only so there is nothing to lock.

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::protocol::{
    InitializeResult, Info, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION,
    ServerCapabilities, ToolsCallParams, ToolsCapability, ToolsListResult,
};
use crate::tools::ToolRegistry;
use crate::{Error, Result};

/// Stdio MCP server
pub struct McpServer {
    registry: ToolRegistry,
}

impl McpServer {
    /// Create a server over a built tool registry
    #[must_use]
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Serve until stdin closes
    pub async fn run(&self) -> Result<()> {
        info!(tools = self.registry.len(), "QuickBooks MCP server ready on stdio");

        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line).await {
                let serialized = serde_json::to_string(&response)?;
                stdout.write_all(serialized.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        info!("stdin closed, shutting down");
        Ok(())
    }

    /// Handle one input line; `None` for notifications (no response due)
    async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcMessage>(line) {
            Ok(JsonRpcMessage::Request(request)) => Some(self.handle_request(request).await),
            Ok(JsonRpcMessage::Notification(notification)) => {
                debug!(method = %notification.method, "Ignoring notification");
                None
            }
            Err(e) => {
                warn!(error = %e, "Malformed JSON-RPC line");
                Some(JsonRpcResponse::error(None, -32700, format!("Parse error: {e}")))
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %request.method, id = %request.id, "Handling request");

        match request.method.as_str() {
            "initialize" => respond(request, &InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability {
                        list_changed: Some(false),
                    }),
                },
                server_info: Info {
                    name: "quickbooks-mcp".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
            }),

            "ping" => JsonRpcResponse::success(request.id, json!({})),

            "tools/list" => respond(request, &ToolsListResult {
                tools: self.registry.tools(),
            }),

            "tools/call" => {
                let params: ToolsCallParams =
                    match serde_json::from_value(request.params.unwrap_or(json!({}))) {
                        Ok(p) => p,
                        Err(e) => {
                            return JsonRpcResponse::error(
                                Some(request.id),
                                -32602,
                                format!("Invalid params: {e}"),
                            );
                        }
                    };

                match self.registry.call(&params.name, &params.arguments).await {
                    Some(result) => match serde_json::to_value(&result) {
                        Ok(value) => JsonRpcResponse::success(request.id, value),
                        Err(e) => JsonRpcResponse::error(
                            Some(request.id),
                            Error::Json(e).to_rpc_code(),
                            "Failed to serialize tool result",
                        ),
                    },
                    None => JsonRpcResponse::error(
                        Some(request.id),
                        -32601,
                        format!("Unknown tool: {}", params.name),
                    ),
                }
            }

            other => {
                JsonRpcResponse::error(Some(request.id), -32601, format!("Method not found: {other}"))
            }
        }
    }
}

/// Serialize a typed result into a success response
fn respond<T: serde::Serialize>(request: JsonRpcRequest, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(request.id, value),
        Err(e) => JsonRpcResponse::error(
            Some(request.id),
            -32603,
            format!("Failed to serialize result: {e}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn server() -> McpServer {
        let registry = ToolRegistry::new(None, None, Vec::new()).unwrap();
        McpServer::new(registry)
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "quickbooks-mcp");
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_tools_list_contains_fixed_tools() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .await
            .unwrap();

        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 6);
        assert!(tools.iter().any(|t| t["name"] == "query_quickbooks"));
    }

    #[tokio::test]
    async fn test_tool_call_failure_is_result_not_rpc_error() {
        // Session is absent: the call must still produce a result payload,
        // never a JSON-RPC error.
        let response = server()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/call",
                    "params":{"name":"query_quickbooks","arguments":{"query":"SELECT * FROM Bill"}}}"#,
            )
            .await
            .unwrap();

        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("not initialized"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rpc_error() {
        let response = server()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":4,"method":"tools/call",
                    "params":{"name":"nope","arguments":{}}}"#,
            )
            .await
            .unwrap();

        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_parse_error_keeps_serving() {
        let response = server().handle_line("{not json").await.unwrap();
        assert_eq!(response.error.unwrap().code, -32700);
    }
}
