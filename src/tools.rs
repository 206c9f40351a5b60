//! Tool registry and the fixed QuickBooks toolset
//!
//! The registry is built once at startup from the synthesized operation set
//! and is read-only afterwards. The invocation surface never raises to the
//! hosting runtime: every call produces a textual result, success or failure.
//!
//! Six fixed tools sit alongside the catalog-driven operations:
//! `create_entity`, `update_entity`, `delete_entity`, `batch_operation`,
//! `query_quickbooks`, `get_quickbooks_entity_schema`. The mutation tools
//! forward the caller's `Id`/`SyncToken` pair untouched; optimistic
//! concurrency is enforced remotely, stale tokens come back as transport
//! errors.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::info;

use crate::catalog::HttpMethod;
use crate::dispatch::{argument_map, dispatch, render_error, render_response};
use crate::protocol::{Tool, ToolsCallResult};
use crate::registry::Operation;
use crate::routing::route;
use crate::schema::SchemaCatalog;
use crate::session::ApiSession;
use crate::{Error, Result};

/// Names reserved by the fixed toolset; catalog operations must not collide
const FIXED_TOOL_NAMES: [&str; 6] = [
    "get_quickbooks_entity_schema",
    "query_quickbooks",
    "create_entity",
    "update_entity",
    "delete_entity",
    "batch_operation",
];

/// Read-only table of invocable tools
pub struct ToolRegistry {
    session: Option<Arc<dyn ApiSession>>,
    schemas: Option<SchemaCatalog>,
    operations: Vec<Operation>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    // The session handle is a trait object with no Debug bound
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("session", &self.session.is_some())
            .field("schemas", &self.schemas)
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

impl ToolRegistry {
    /// Build the registry from a synthesized operation set.
    ///
    /// `session: None` records a failed session initialization; every tool
    /// then reports it at call time instead of dispatching.
    pub fn new(
        session: Option<Arc<dyn ApiSession>>,
        schemas: Option<SchemaCatalog>,
        operations: Vec<Operation>,
    ) -> Result<Self> {
        let mut index = HashMap::with_capacity(operations.len());
        for (i, op) in operations.iter().enumerate() {
            if FIXED_TOOL_NAMES.contains(&op.name.as_str()) {
                return Err(Error::Config(format!(
                    "Catalog operation '{}' collides with a fixed tool name",
                    op.name
                )));
            }
            index.insert(op.name.clone(), i);
        }

        Ok(Self {
            session,
            schemas,
            operations,
            index,
        })
    }

    /// All tools, fixed ones first, catalog operations in catalog order
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        let mut tools = fixed_tools();
        tools.extend(self.operations.iter().map(|op| Tool {
            name: op.name.clone(),
            description: Some(op.doc.clone()),
            input_schema: op.input_schema(),
        }));
        tools
    }

    /// Number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        FIXED_TOOL_NAMES.len() + self.operations.len()
    }

    /// Returns `true` if no tools are registered (never in practice)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Invoke a tool by name. `None` means the name is unknown to the
    /// registry; `Some` is always a textual result, even on failure.
    pub async fn call(&self, name: &str, arguments: &Value) -> Option<ToolsCallResult> {
        let args = argument_map(arguments);

        let entity = args
            .get("entity_type")
            .and_then(Value::as_str)
            .unwrap_or("entity")
            .to_string();

        let (context, outcome) = match name {
            "get_quickbooks_entity_schema" => {
                ("fetching entity schema".to_string(), self.entity_schema(&args))
            }
            "query_quickbooks" => ("executing query".to_string(), self.query(&args).await),
            "create_entity" => (format!("creating {entity}"), self.create_entity(&args).await),
            "update_entity" => (format!("updating {entity}"), self.update_entity(&args).await),
            "delete_entity" => (format!("deleting {entity}"), self.delete_entity(&args).await),
            "batch_operation" => ("executing batch".to_string(), self.batch_operation(&args).await),
            other => {
                let op = self.operations.get(*self.index.get(other)?)?;
                (format!("executing {other}"), self.call_operation(op, &args).await)
            }
        };

        Some(match outcome {
            Ok(value) => ToolsCallResult::text(render_response(&value)),
            Err(err) => ToolsCallResult::error_text(render_error(&context, &err)),
        })
    }

    /// Invoke one catalog-driven operation
    async fn call_operation(&self, op: &Operation, args: &Map<String, Value>) -> Result<Value> {
        let session = self.session()?;
        info!(operation = %op.name, arguments = ?args, "Executing operation");

        let routed = route(op, args)?;
        dispatch(session.as_ref(), &op.name, op.method, &routed).await
    }

    fn session(&self) -> Result<&Arc<dyn ApiSession>> {
        self.session.as_ref().ok_or(Error::SessionNotInitialized)
    }

    fn entity_schema(&self, args: &Map<String, Value>) -> Result<Value> {
        let entity = require_str(args, "entity_name")?;
        let schemas = self.schemas.as_ref().ok_or_else(|| {
            Error::Config("The entity schema definition file was not found".to_string())
        })?;
        schemas.lookup(&entity).cloned()
    }

    async fn query(&self, args: &Map<String, Value>) -> Result<Value> {
        let session = self.session()?;
        let statement = require_str(args, "query")?;
        info!(query = %statement, "Executing QuickBooks query");
        session.query(&statement).await
    }

    async fn create_entity(&self, args: &Map<String, Value>) -> Result<Value> {
        let session = self.session()?;
        let entity_type = require_str(args, "entity_type")?;
        let data = parse_entity_payload("entity_data", required(args, "entity_data")?)?;

        info!(entity_type = %entity_type, data = %data, "Creating entity");
        session
            .execute(HttpMethod::Post, &entity_route(&entity_type), &[], Some(&data))
            .await
    }

    async fn update_entity(&self, args: &Map<String, Value>) -> Result<Value> {
        let session = self.session()?;
        let entity_type = require_str(args, "entity_type")?;
        // The caller is responsible for Id, SyncToken and `sparse: true`;
        // the payload is forwarded as-is and the remote side rejects stale
        // tokens.
        let data = parse_entity_payload("entity_data", required(args, "entity_data")?)?;

        info!(entity_type = %entity_type, data = %data, "Updating entity");
        session
            .execute(HttpMethod::Post, &entity_route(&entity_type), &[], Some(&data))
            .await
    }

    async fn delete_entity(&self, args: &Map<String, Value>) -> Result<Value> {
        let session = self.session()?;
        let entity_type = require_str(args, "entity_type")?;
        let entity_id = require_str(args, "entity_id")?;
        let sync_token = require_str(args, "sync_token")?;

        let body = json!({"Id": entity_id, "SyncToken": sync_token});
        let query = [("operation".to_string(), "delete".to_string())];

        info!(entity_type = %entity_type, id = %entity_id, sync_token = %sync_token, "Deleting entity");
        session
            .execute(HttpMethod::Post, &entity_route(&entity_type), &query, Some(&body))
            .await
    }

    async fn batch_operation(&self, args: &Map<String, Value>) -> Result<Value> {
        let session = self.session()?;
        let data = parse_entity_payload("operations", required(args, "operations")?)?;

        // No local cap on item count; the remote endpoint enforces its own
        // limit and its rejection is passed through.
        let count = data
            .get("BatchItemRequest")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);

        info!(operations = count, "Executing batch");
        session
            .execute(HttpMethod::Post, "/batch", &[], Some(&data))
            .await
    }
}

/// Mutation route for an entity type: `/{lowercase entity type}`
fn entity_route(entity_type: &str) -> String {
    format!("/{}", entity_type.to_lowercase())
}

/// Accept a payload as structured data or a JSON-encoded string, normalizing
/// to one structured value before routing.
fn parse_entity_payload(field: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Object(_) | Value::Array(_) => Ok(value.clone()),
        Value::String(raw) => serde_json::from_str(raw).map_err(|e| Error::InvalidPayload {
            field: field.to_string(),
            message: e.to_string(),
        }),
        other => Err(Error::InvalidPayload {
            field: field.to_string(),
            message: format!("expected a JSON object or JSON-encoded string, got {other}"),
        }),
    }
}

fn required<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    args.get(key)
        .ok_or_else(|| Error::Protocol(format!("Missing required argument '{key}'")))
}

fn require_str(args: &Map<String, Value>, key: &str) -> Result<String> {
    match required(args, key)? {
        Value::String(s) => Ok(s.clone()),
        _ => Err(Error::Protocol(format!("Argument '{key}' must be a string"))),
    }
}

/// Definitions of the six fixed tools
fn fixed_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: "get_quickbooks_entity_schema".to_string(),
            description: Some(
                "Fetches the field schema for a QuickBooks entity (e.g. 'Bill', 'Customer'). \
                 Use this before constructing a query with `query_quickbooks` or a mutation \
                 payload."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity_name": {
                        "type": "string",
                        "description": "Entity name, e.g. 'Account', 'Invoice'"
                    }
                },
                "required": ["entity_name"]
            }),
        },
        Tool {
            name: "query_quickbooks".to_string(),
            description: Some(
                "Executes a SQL-like query against a QuickBooks entity. Use \
                 `get_quickbooks_entity_schema` first to learn the fields available for the \
                 select and where clauses."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Statement such as SELECT * FROM Invoice WHERE Id = '42'"
                    }
                },
                "required": ["query"]
            }),
        },
        Tool {
            name: "create_entity".to_string(),
            description: Some(
                "Creates a new QuickBooks entity (Invoice, Purchase, JournalEntry, Vendor, \
                 Customer, ...). `entity_data` may be a JSON object or a JSON-encoded string."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity_type": {
                        "type": "string",
                        "description": "Entity type, e.g. 'Invoice'"
                    },
                    "entity_data": {
                        "description": "Entity fields as a JSON object or JSON-encoded string"
                    }
                },
                "required": ["entity_type", "entity_data"]
            }),
        },
        Tool {
            name: "update_entity".to_string(),
            description: Some(
                "Updates an existing QuickBooks entity with a sparse update. `entity_data` \
                 must include 'Id' and the current 'SyncToken', and 'sparse': true to send \
                 only changed fields. Query the entity first to get its SyncToken."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity_type": {
                        "type": "string",
                        "description": "Entity type, e.g. 'Account'"
                    },
                    "entity_data": {
                        "description": "Fields to update, including Id and SyncToken"
                    }
                },
                "required": ["entity_type", "entity_data"]
            }),
        },
        Tool {
            name: "delete_entity".to_string(),
            description: Some(
                "Deletes a QuickBooks entity. Only some entity types support deletion \
                 (Purchase, Invoice, Bill, Payment, JournalEntry); the remote API rejects \
                 the rest. This action is permanent."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity_type": {"type": "string", "description": "Entity type, e.g. 'Purchase'"},
                    "entity_id": {"type": "string", "description": "Id of the entity to delete"},
                    "sync_token": {"type": "string", "description": "Current SyncToken of the entity"}
                },
                "required": ["entity_type", "entity_id", "sync_token"]
            }),
        },
        Tool {
            name: "batch_operation".to_string(),
            description: Some(
                "Executes multiple QuickBooks operations in one call via the batch endpoint. \
                 `operations` is a JSON object (or JSON-encoded string) with a \
                 'BatchItemRequest' list; each item carries a 'bId', an 'operation' \
                 (create/update/delete/query) and its entity data."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "operations": {
                        "description": "Batch payload as a JSON object or JSON-encoded string"
                    }
                },
                "required": ["operations"]
            }),
        },
    ]
}
