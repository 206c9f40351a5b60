//! MCP type definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition advertised via `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (1-128 chars, [a-zA-Z0-9_.-])
    pub name: String,
    /// Tool description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Input JSON Schema
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Content item in a tool call response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    /// Text content, the only kind this server produces
    #[serde(rename = "text")]
    Text {
        /// Text value
        text: String,
    },
}

impl Content {
    /// Convenience constructor for text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Server capabilities advertised during initialize
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tools capability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

/// Tools capability flags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsCapability {
    /// Whether the tool list can change after initialize (it cannot here)
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Implementation info exchanged during initialize
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    /// Implementation name
    pub name: String,
    /// Implementation version
    pub version: String,
}
