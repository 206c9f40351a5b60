//! Argument router: splits caller arguments into path/query/body buckets
//!
//! Pure functions, no side effects: the same operation and arguments always
//! produce the same [`RoutedCall`]. Each argument name lands in exactly one
//! bucket, chosen by its parameter's declared location; names unknown to the
//! plan become body fields for body-accepting methods and are dropped
//! otherwise.

use serde_json::{Map, Value};

use crate::catalog::ParameterLocation;
use crate::registry::Operation;
use crate::{Error, Result};

/// Ephemeral routing result for a single invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedCall {
    /// Route with every `{name}` placeholder substituted
    pub route: String,
    /// Arguments routed to path placeholders
    pub path_params: Map<String, Value>,
    /// Arguments routed to the query string
    pub query_params: Map<String, Value>,
    /// Remaining arguments, present only for body-accepting methods that
    /// received any. `None` means "no body", distinct from an empty object.
    pub body: Option<Map<String, Value>>,
}

/// Route caller arguments against an operation's parameter plan
pub fn route(op: &Operation, args: &Map<String, Value>) -> Result<RoutedCall> {
    let args = normalize_arguments(args);

    let mut path_params = Map::new();
    let mut query_params = Map::new();

    for param in &op.param_plan {
        if let Some(value) = args.get(&param.name) {
            match param.location {
                ParameterLocation::Path => {
                    path_params.insert(param.name.clone(), value.clone());
                }
                ParameterLocation::Query => {
                    query_params.insert(param.name.clone(), value.clone());
                }
            }
        }
    }

    let body = if op.method.accepts_body() {
        let remaining: Map<String, Value> = args
            .iter()
            .filter(|(name, _)| {
                !path_params.contains_key(*name) && !query_params.contains_key(*name)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if remaining.is_empty() { None } else { Some(remaining) }
    } else {
        None
    };

    let route = format_route(&op.route, &path_params)?;

    Ok(RoutedCall {
        route,
        path_params,
        query_params,
        body,
    })
}

/// Shim for clients that pass all arguments as a single `kwargs` string.
///
/// When the argument object holds exactly one key named `kwargs` whose value
/// is a string containing `=`, the string is split on the first `=` into a
/// name/value pair. Anything else leaves the arguments untouched.
fn normalize_arguments(args: &Map<String, Value>) -> Map<String, Value> {
    if args.len() == 1 {
        if let Some(Value::String(raw)) = args.get("kwargs") {
            if let Some((key, value)) = raw.split_once('=') {
                let mut parsed = Map::new();
                parsed.insert(key.to_string(), Value::String(value.to_string()));
                return parsed;
            }
        }
    }
    args.clone()
}

/// Substitute `{name}` placeholders with routed path parameters
fn format_route(template: &str, path_params: &Map<String, Value>) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        result.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('}').map(|i| start + i) else {
            return Err(Error::Internal(format!("Unbalanced brace in route {template}")));
        };
        let name = &rest[start + 1..end];

        match path_params.get(name) {
            Some(value) => result.push_str(&value_to_string(value)),
            None => {
                return Err(Error::MissingPathParameter {
                    param: name.to_string(),
                    route: template.to_string(),
                });
            }
        }

        rest = &rest[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Render a JSON value for use in a path segment or query string
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_catalog;
    use crate::registry::synthesize;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn operation(method: &str, route: &str, params: &str) -> Operation {
        let catalog = parse_catalog(&format!(
            r#"[{{"method": "{method}", "route": "{route}", "parameters": {params}}}]"#
        ))
        .unwrap();
        synthesize(&catalog).unwrap().remove(0)
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_path_substitution() {
        let op = operation(
            "get",
            "/v3/company/{realmId}/invoice/{invoiceId}",
            r#"[{"name": "realmId", "in": "path", "required": true, "type": "string"},
                {"name": "invoiceId", "in": "path", "required": true, "type": "string"}]"#,
        );

        let routed = route(&op, &args(json!({"invoiceId": "42"}))).unwrap();

        assert_eq!(routed.route, "/invoice/42");
        assert_eq!(routed.path_params.get("invoiceId"), Some(&json!("42")));
        assert!(routed.query_params.is_empty());
        assert_eq!(routed.body, None);
    }

    #[test]
    fn test_missing_path_parameter() {
        let op = operation(
            "get",
            "/invoice/{invoiceId}",
            r#"[{"name": "invoiceId", "in": "path", "required": true, "type": "string"}]"#,
        );

        let err = route(&op, &args(json!({}))).unwrap_err();
        match err {
            Error::MissingPathParameter { param, route } => {
                assert_eq!(param, "invoiceId");
                assert_eq!(route, "/invoice/{invoiceId}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_query_and_body_are_disjoint() {
        let op = operation(
            "post",
            "/invoice",
            r#"[{"name": "minorversion", "in": "query", "required": false, "type": "string"}]"#,
        );

        let routed = route(
            &op,
            &args(json!({"minorversion": "75", "CustomerRef": {"value": "1"}, "TotalAmt": 100})),
        )
        .unwrap();

        assert_eq!(routed.query_params.get("minorversion"), Some(&json!("75")));
        let body = routed.body.unwrap();
        assert!(!body.contains_key("minorversion"));
        assert_eq!(body.get("TotalAmt"), Some(&json!(100)));
        assert_eq!(body.get("CustomerRef"), Some(&json!({"value": "1"})));
    }

    #[test]
    fn test_get_drops_free_arguments() {
        let op = operation("get", "/preferences", "[]");

        let routed = route(&op, &args(json!({"stray": "value"}))).unwrap();
        assert_eq!(routed.body, None);
        assert!(routed.query_params.is_empty());
    }

    #[test]
    fn test_query_params_keep_plan_order() {
        let op = operation(
            "get",
            "/reports/ProfitAndLoss",
            r#"[{"name": "start_date", "in": "query", "required": false, "type": "string"},
                {"name": "end_date", "in": "query", "required": false, "type": "string"}]"#,
        );

        // Caller order is irrelevant; the plan decides
        let routed = route(
            &op,
            &args(json!({"end_date": "2024-12-31", "start_date": "2024-01-01"})),
        )
        .unwrap();

        let keys: Vec<&String> = routed.query_params.keys().collect();
        assert_eq!(keys, ["start_date", "end_date"]);
    }

    #[test]
    fn test_routing_is_deterministic() {
        let op = operation(
            "post",
            "/invoice",
            r#"[{"name": "minorversion", "in": "query", "required": false, "type": "string"}]"#,
        );
        let input = args(json!({"minorversion": "75", "Line": []}));

        assert_eq!(route(&op, &input).unwrap(), route(&op, &input).unwrap());
    }

    #[test]
    fn test_kwargs_shim() {
        let op = operation(
            "get",
            "/invoice/{invoiceId}",
            r#"[{"name": "invoiceId", "in": "path", "required": true, "type": "string"}]"#,
        );

        let routed = route(&op, &args(json!({"kwargs": "invoiceId=42"}))).unwrap();
        assert_eq!(routed.route, "/invoice/42");

        // Values containing '=' keep everything after the first one
        let routed = route(&op, &args(json!({"kwargs": "invoiceId=a=b"}))).unwrap();
        assert_eq!(routed.route, "/invoice/a=b");
    }

    #[test]
    fn test_kwargs_shim_fallback() {
        let op = operation("get", "/preferences", "[]");

        // No '=' in the value: arguments pass through unchanged
        let routed = route(&op, &args(json!({"kwargs": "plain"}))).unwrap();
        assert_eq!(routed.route, "/preferences");

        // Non-string kwargs value: untouched
        let routed = route(&op, &args(json!({"kwargs": 7}))).unwrap();
        assert_eq!(routed.route, "/preferences");
    }
}
