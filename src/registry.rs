//! Operation synthesizer: one invocable operation per catalog descriptor
//!
//! Builds the read-only operation set at startup. Name derivation is
//! deterministic: method + route with separators normalized to underscores.
//! Two descriptors deriving the same name is a configuration error and aborts
//! startup before any operation becomes callable.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde_json::{Map, Value, json};

use crate::catalog::{EndpointDescriptor, HttpMethod, ParameterSpec};
use crate::{Error, Result};

/// Path prefix the transport session injects on every request; descriptors
/// carry it, registered operations must not.
pub const COMPANY_PREFIX: &str = "/v3/company/{realmId}";

/// An invocable wrapper around one endpoint descriptor
#[derive(Debug, Clone)]
pub struct Operation {
    /// Unique derived name (also the MCP tool name)
    pub name: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Route template with the company prefix stripped and `realmId` gone
    pub route: String,
    /// Parameters the caller may supply, in catalog order, `realmId` removed
    pub param_plan: Vec<ParameterSpec>,
    /// Tool description shown to the calling runtime
    pub doc: String,
}

impl Operation {
    /// JSON Schema for the tool's arguments, built from the parameter plan.
    ///
    /// Body-accepting methods leave `additionalProperties` open since any
    /// unrouted argument becomes a body field.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.param_plan {
            let mut prop = Map::new();
            prop.insert(
                "type".to_string(),
                Value::String(json_type_for(&param.type_hint).to_string()),
            );
            if let Some(ref desc) = param.description {
                prop.insert("description".to_string(), Value::String(desc.clone()));
            }
            properties.insert(param.name.clone(), Value::Object(prop));

            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": self.method.accepts_body()
        })
    }
}

/// Map an upstream type hint to a JSON Schema type
fn json_type_for(hint: &str) -> &'static str {
    match hint {
        "integer" | "int" | "long" => "integer",
        "number" | "float" | "double" | "decimal" => "number",
        "boolean" | "bool" => "boolean",
        "array" => "array",
        "object" => "object",
        _ => "string",
    }
}

/// Synthesize the operation set from a catalog
///
/// Output order matches catalog order. Returns `Error::Config` on the first
/// duplicate derived name.
pub fn synthesize(catalog: &[EndpointDescriptor]) -> Result<Vec<Operation>> {
    let mut seen = HashSet::new();
    let mut operations = Vec::with_capacity(catalog.len());

    for descriptor in catalog {
        let op = synthesize_one(descriptor);

        if !seen.insert(op.name.clone()) {
            return Err(Error::Config(format!(
                "Duplicate operation name '{}' derived from catalog route {}: \
                 catalog routes must produce unique names",
                op.name, descriptor.route
            )));
        }

        operations.push(op);
    }

    Ok(operations)
}

/// Build one operation from its descriptor
fn synthesize_one(descriptor: &EndpointDescriptor) -> Operation {
    let route = strip_company_prefix(&descriptor.route);
    let name = derive_name(descriptor.method, &route);

    let param_plan: Vec<ParameterSpec> = descriptor
        .parameters
        .iter()
        .filter(|p| p.name != "realmId")
        .cloned()
        .collect();

    let doc = build_doc(descriptor, &name, &param_plan);

    Operation {
        name,
        method: descriptor.method,
        route,
        param_plan,
        doc,
    }
}

/// Remove the company/realm prefix when present; leave other routes unchanged
fn strip_company_prefix(route: &str) -> String {
    match route.strip_prefix(COMPANY_PREFIX) {
        Some(rest) => rest.to_string(),
        None => route.to_string(),
    }
}

/// Derive the operation name from method + route.
///
/// Slashes, dashes and colons become underscores; braces are dropped so
/// placeholder names survive verbatim (`/invoice/{invoiceId}` becomes
/// `get_invoice_invoiceId`).
fn derive_name(method: HttpMethod, route: &str) -> String {
    let mut name = String::with_capacity(route.len() + 8);
    name.push_str(method.as_str());
    for c in route.chars() {
        match c {
            '/' | '-' | ':' => name.push('_'),
            '{' | '}' => {}
            other => name.push(other),
        }
    }
    name
}

/// Synthesize a summary sentence from a derived name: capitalize the first
/// token and join the rest with spaces.
fn summary_from_name(name: &str) -> String {
    let mut words: Vec<String> = name.split('_').map(str::to_string).collect();
    if let Some(first) = words.first_mut() {
        let mut chars = first.chars();
        if let Some(c) = chars.next() {
            *first = c.to_uppercase().collect::<String>() + chars.as_str();
        }
    }
    format!("{}.", words.join(" "))
}

/// Build the tool description: summary, outcome note, body shape, parameters
fn build_doc(descriptor: &EndpointDescriptor, name: &str, param_plan: &[ParameterSpec]) -> String {
    let summary = match descriptor.summary {
        Some(ref s) => {
            let s = s.trim_end();
            if s.ends_with('.') {
                s.to_string()
            } else {
                format!("{s}.")
            }
        }
        None => summary_from_name(name),
    };

    let mut doc = format!("{summary} ");

    if descriptor.response_description != "OK" {
        let _ = write!(
            doc,
            "If successful, the outcome will be \"{}\". ",
            descriptor.response_description
        );
    }

    if let Some(ref shape) = descriptor.request_body {
        let _ = write!(
            doc,
            "The request body should be a JSON object with the following structure: {shape}. "
        );
    }

    if !param_plan.is_empty() {
        let mut params = Map::new();
        for p in param_plan {
            params.insert(
                p.name.clone(),
                json!({
                    "description": p.description.as_deref().unwrap_or("No description provided"),
                    "required": p.required,
                    "type": p.type_hint,
                    "in": p.location,
                }),
            );
        }
        let rendered = serde_json::to_string_pretty(&Value::Object(params)).unwrap_or_default();
        let _ = write!(doc, "Parameters: {rendered}. ");
    }

    doc.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_catalog;
    use pretty_assertions::assert_eq;

    fn invoice_catalog() -> Vec<EndpointDescriptor> {
        parse_catalog(
            r#"[
                {
                    "method": "get",
                    "route": "/v3/company/{realmId}/invoice/{invoiceId}",
                    "parameters": [
                        {"name": "realmId", "in": "path", "required": true, "type": "string"},
                        {"name": "invoiceId", "in": "path", "required": true, "type": "string",
                         "description": "Invoice Id"}
                    ]
                }
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_derive_name() {
        assert_eq!(
            derive_name(HttpMethod::Get, "/invoice/{invoiceId}"),
            "get_invoice_invoiceId"
        );
        assert_eq!(
            derive_name(HttpMethod::Post, "/journal-entry"),
            "post_journal_entry"
        );
        assert_eq!(derive_name(HttpMethod::Get, "/reports:run"), "get_reports_run");
    }

    #[test]
    fn test_synthesize_strips_realm() {
        let ops = synthesize(&invoice_catalog()).unwrap();

        assert_eq!(ops.len(), 1);
        let op = &ops[0];
        assert_eq!(op.name, "get_invoice_invoiceId");
        assert_eq!(op.route, "/invoice/{invoiceId}");
        assert!(!op.route.contains("realmId"));
        assert_eq!(op.param_plan.len(), 1);
        assert_eq!(op.param_plan[0].name, "invoiceId");
    }

    #[test]
    fn test_remaining_placeholders_have_params() {
        for op in synthesize(&invoice_catalog()).unwrap() {
            let mut rest = op.route.as_str();
            while let Some(start) = rest.find('{') {
                let end = rest[start..].find('}').map(|i| start + i).unwrap();
                let placeholder = &rest[start + 1..end];
                assert!(
                    op.param_plan.iter().any(|p| p.name == placeholder),
                    "placeholder {placeholder} missing from plan"
                );
                rest = &rest[end + 1..];
            }
        }
    }

    #[test]
    fn test_duplicate_name_is_fatal() {
        let catalog = parse_catalog(
            r#"[
                {"method": "get", "route": "/v3/company/{realmId}/preferences", "parameters": []},
                {"method": "get", "route": "/preferences", "parameters": []}
            ]"#,
        )
        .unwrap();

        let err = synthesize(&catalog).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("get_preferences"));
    }

    #[test]
    fn test_summary_synthesized_when_absent() {
        let ops = synthesize(&invoice_catalog()).unwrap();
        assert!(ops[0].doc.starts_with("Get invoice invoiceId."));
    }

    #[test]
    fn test_doc_mentions_outcome_and_body() {
        let catalog = parse_catalog(
            r#"[
                {
                    "method": "post",
                    "route": "/v3/company/{realmId}/invoice",
                    "summary": "Create an invoice",
                    "response_description": "The created invoice",
                    "parameters": [{"name": "realmId", "in": "path", "required": true, "type": "string"}],
                    "request_data": {"CustomerRef": {"value": "string"}}
                }
            ]"#,
        )
        .unwrap();

        let op = &synthesize(&catalog).unwrap()[0];
        assert!(op.doc.starts_with("Create an invoice."));
        assert!(op.doc.contains("If successful, the outcome will be \"The created invoice\"."));
        assert!(op.doc.contains("CustomerRef"));
        // realmId never surfaces in the documentation
        assert!(!op.doc.contains("realmId"));
    }

    #[test]
    fn test_input_schema() {
        let op = &synthesize(&invoice_catalog()).unwrap()[0];
        let schema = op.input_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["invoiceId"]["type"], "string");
        assert_eq!(schema["required"][0], "invoiceId");
        // GET: no free-form body arguments
        assert_eq!(schema["additionalProperties"], false);
    }
}
