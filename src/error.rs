//! Error types for the QuickBooks MCP server

use std::io;

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// QuickBooks MCP server errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (bad credentials, unreadable catalog, duplicate
    /// derived operation names). Fatal at startup, never produced per call.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The QuickBooks session failed to initialize at startup; every tool
    /// call short-circuits to this before any routing work.
    #[error(
        "QuickBooks session not initialized. Please check your credentials and restart the server."
    )]
    SessionNotInitialized,

    /// Caller supplied a JSON-encoded string that does not parse
    #[error("Invalid JSON in {field}: {message}")]
    InvalidPayload {
        /// Argument that carried the payload
        field: String,
        /// Parser message
        message: String,
    },

    /// A route placeholder had no matching argument
    #[error("Missing required path parameter '{param}' for route {route}")]
    MissingPathParameter {
        /// Placeholder name
        param: String,
        /// Route template being formatted
        route: String,
    },

    /// Transport failure: network error, non-2xx status, token refresh failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// No schema recorded for the requested entity
    #[error("Schema not found for entity '{entity}'. Available entities: {available:?}")]
    SchemaNotFound {
        /// Entity name as requested
        entity: String,
        /// Names present in the schema catalog
        available: Vec<String>,
    },

    /// Protocol error (malformed JSON-RPC traffic)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert to a JSON-RPC error code
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::Json(_) => -32700,     // Parse error
            Self::Protocol(_) => -32600, // Invalid request
            _ => -32603,                 // Internal error
        }
    }
}
