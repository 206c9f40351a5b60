//! Transport dispatcher: forwards routed calls and normalizes results
//!
//! The dispatcher is the only place catalog-driven operations touch the
//! session. Every dispatch is logged to the tracing channel (stderr), which
//! is separate from the result channel (stdout JSON-RPC).

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::catalog::HttpMethod;
use crate::routing::{RoutedCall, value_to_string};
use crate::session::ApiSession;
use crate::{Error, Result};

/// Dispatch a routed call through the session.
///
/// `body: None` is forwarded as "no body", never as an empty object; some
/// endpoints distinguish the two.
pub async fn dispatch(
    session: &dyn ApiSession,
    name: &str,
    method: HttpMethod,
    routed: &RoutedCall,
) -> Result<Value> {
    debug!(
        operation = name,
        %method,
        route = %routed.route,
        query = ?routed.query_params,
        has_body = routed.body.is_some(),
        "Dispatching operation"
    );

    let query: Vec<(String, String)> = routed
        .query_params
        .iter()
        .map(|(k, v)| (k.clone(), value_to_string(v)))
        .collect();

    let body = routed.body.as_ref().map(|b| Value::Object(b.clone()));

    let result = session
        .execute(method, &routed.route, &query, body.as_ref())
        .await;

    match &result {
        Ok(response) => debug!(operation = name, %response, "Operation succeeded"),
        Err(e) => warn!(operation = name, error = %e, "Operation failed"),
    }

    result
}

/// Render a successful response as tool output text: structured values are
/// pretty-printed, raw strings pass through unchanged.
#[must_use]
pub fn render_response(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Format an error as the textual result for a named operation
#[must_use]
pub fn render_error(context: &str, err: &Error) -> String {
    match err {
        Error::SessionNotInitialized => format!("Error: {err}"),
        Error::InvalidPayload { .. } => format!("Error: {err}"),
        Error::MissingPathParameter { .. } => format!("Error: {err}"),
        Error::SchemaNotFound { .. } => format!("Error: {err}"),
        _ => format!("Error {context}: {err}"),
    }
}

/// Convert arbitrary tool arguments into a keyword-argument map.
///
/// The runtime contract is keyword arguments; anything else is treated as an
/// empty map rather than a fault.
#[must_use]
pub fn argument_map(args: &Value) -> Map<String, Value> {
    match args {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_render_response_pretty_prints_objects() {
        let rendered = render_response(&json!({"Invoice": {"Id": "42"}}));
        assert!(rendered.contains("\"Id\": \"42\""));
        assert!(rendered.contains('\n'));
    }

    #[test]
    fn test_render_response_passes_strings_through() {
        assert_eq!(render_response(&json!("already text")), "already text");
    }

    #[test]
    fn test_render_error_names_operation() {
        let err = Error::Transport("HTTP 401".to_string());
        assert_eq!(
            render_error("executing get_preferences", &err),
            "Error executing get_preferences: Transport error: HTTP 401"
        );
    }

    #[test]
    fn test_render_error_session_not_initialized() {
        let text = render_error("executing query", &Error::SessionNotInitialized);
        assert!(text.starts_with("Error: QuickBooks session not initialized"));
    }

    #[test]
    fn test_argument_map_tolerates_non_objects() {
        assert!(argument_map(&json!(null)).is_empty());
        assert!(argument_map(&json!([1, 2])).is_empty());
        assert_eq!(argument_map(&json!({"a": 1})).get("a"), Some(&json!(1)));
    }
}
