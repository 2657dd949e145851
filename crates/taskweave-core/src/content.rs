//! Textual content extraction from opaque report payloads.
//!
//! Sequential and parallel flows thread "what the previous step said" between
//! stages without knowing the concrete payload type. A payload that carries a
//! conventional text attribute (`content`, then `text`) yields that attribute;
//! anything else falls back to a generic textual rendering.

use serde_json::Value;

/// Attribute names probed, in order, on object payloads.
const CONTENT_FIELDS: [&str; 2] = ["content", "text"];

/// Extract the textual content of a payload.
///
/// Returns `None` for a missing or `null` payload.
pub fn extract_content(data: Option<&Value>) -> Option<String> {
    match data? {
        Value::Null => None,
        Value::Object(map) => {
            let field = CONTENT_FIELDS
                .iter()
                .find_map(|name| map.get(*name).filter(|v| !v.is_null()));
            Some(match field {
                Some(value) => value_to_string(value),
                None => value_to_string(&Value::Object(map.clone())),
            })
        }
        other => Some(value_to_string(other)),
    }
}

/// Convert a JSON value to a display string.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // For objects/arrays, return compact JSON
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
