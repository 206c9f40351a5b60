//! MCP protocol types (stdio JSON-RPC subset)

mod messages;
mod types;

pub use messages::{
    InitializeResult, JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, ToolsCallParams, ToolsCallResult, ToolsListResult,
};
pub use types::{Content, Info, ServerCapabilities, Tool, ToolsCapability};

/// MCP protocol version implemented by this server
pub const PROTOCOL_VERSION: &str = "2024-11-05";
