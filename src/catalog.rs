//! Endpoint catalog: declarative descriptors of QuickBooks REST endpoints
//!
//! The catalog is an ordered JSON array of [`EndpointDescriptor`] values,
//! loaded once at startup and immutable thereafter. Each descriptor records
//! the method, the route template with `{name}` placeholders, the parameter
//! locations, and an optional request-body shape hint. The registry turns
//! each descriptor into one callable operation.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{Error, Result};

/// HTTP method of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Lowercase method name, as used in derived operation names
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }

    /// Whether free (unrouted) arguments become the request body
    #[must_use]
    pub fn accepts_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a parameter is placed in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// Substituted into a `{name}` route placeholder
    Path,
    /// Appended to the query string
    Query,
}

/// One parameter of an endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name
    pub name: String,
    /// Path or query
    #[serde(rename = "in", alias = "location")]
    pub location: ParameterLocation,
    /// Whether the remote API requires it
    #[serde(default)]
    pub required: bool,
    /// Type hint from the upstream API description (e.g. "string")
    #[serde(default = "default_type_hint", rename = "type")]
    pub type_hint: String,
    /// Human description
    #[serde(default)]
    pub description: Option<String>,
}

fn default_type_hint() -> String {
    "unknown".to_string()
}

/// One endpoint of the remote API, as supplied by the catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// HTTP method
    pub method: HttpMethod,
    /// Route template, possibly carrying the `/v3/company/{realmId}` prefix
    #[serde(alias = "route_template")]
    pub route: String,
    /// Short human summary; synthesized from the name when absent
    #[serde(default)]
    pub summary: Option<String>,
    /// Description of the successful outcome ("OK" when unremarkable)
    #[serde(default = "default_response_description")]
    pub response_description: String,
    /// Ordered parameter list
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    /// Shape hint for the request body, if the endpoint takes one
    #[serde(default, alias = "request_data")]
    pub request_body: Option<Value>,
}

fn default_response_description() -> String {
    "OK".to_string()
}

/// Load the endpoint catalog from a JSON file
///
/// Loading errors are fatal at startup: a server with a partial catalog
/// would silently advertise the wrong tool set.
pub fn load_catalog(path: &Path) -> Result<Vec<EndpointDescriptor>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read API catalog {path:?}: {e}")))?;

    let catalog = parse_catalog(&content)
        .map_err(|e| Error::Config(format!("Failed to parse API catalog {path:?}: {e}")))?;

    info!(count = catalog.len(), path = %path.display(), "Loaded endpoint catalog");
    Ok(catalog)
}

/// Parse a catalog from its JSON text
pub fn parse_catalog(content: &str) -> Result<Vec<EndpointDescriptor>> {
    let catalog: Vec<EndpointDescriptor> = serde_json::from_str(content)?;
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_catalog() {
        let catalog = parse_catalog(
            r#"[
                {
                    "method": "get",
                    "route": "/v3/company/{realmId}/invoice/{invoiceId}",
                    "summary": "Read an invoice",
                    "response_description": "The invoice",
                    "parameters": [
                        {"name": "realmId", "in": "path", "required": true, "type": "string"},
                        {"name": "invoiceId", "in": "path", "required": true, "type": "string"}
                    ]
                },
                {
                    "method": "post",
                    "route": "/v3/company/{realmId}/invoice",
                    "parameters": [
                        {"name": "realmId", "in": "path", "required": true, "type": "string"},
                        {"name": "minorversion", "in": "query", "required": false, "type": "string"}
                    ],
                    "request_data": {"Line": [], "CustomerRef": {"value": "string"}}
                }
            ]"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].method, HttpMethod::Get);
        assert_eq!(catalog[0].parameters.len(), 2);
        assert_eq!(catalog[0].parameters[1].location, ParameterLocation::Path);
        assert_eq!(catalog[1].summary, None);
        assert_eq!(catalog[1].response_description, "OK");
        assert!(catalog[1].request_body.is_some());
    }

    #[test]
    fn test_accepts_body() {
        assert!(HttpMethod::Post.accepts_body());
        assert!(HttpMethod::Put.accepts_body());
        assert!(HttpMethod::Patch.accepts_body());
        assert!(!HttpMethod::Get.accepts_body());
        assert!(!HttpMethod::Delete.accepts_body());
    }

    #[test]
    fn test_load_catalog_missing_file() {
        let err = load_catalog(Path::new("/nonexistent/apis.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
