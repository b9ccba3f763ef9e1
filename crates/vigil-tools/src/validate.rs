use crate::call::ToolArgs;
use crate::error::ToolError;

/// Checks arguments against a descriptor's input schema: every
/// required property must be present and every provided property of a
/// known primitive type must carry a matching JSON type. Unknown extra
/// arguments are tolerated; typed handlers ignore them on
/// deserialization anyway.
///
/// # Errors
///
/// Returns `ToolError::InvalidArguments` naming the first offending
/// property.
pub fn validate_args(schema: &schemars::Schema, args: &ToolArgs) -> Result<(), ToolError> {
    let Some(obj) = schema.as_object() else {
        return Ok(());
    };

    if let Some(required) = obj.get("required").and_then(|v| v.as_array()) {
        for name in required.iter().filter_map(|v| v.as_str()) {
            if !args.contains_key(name) {
                return Err(ToolError::InvalidArguments {
                    message: format!("missing required argument `{name}`"),
                });
            }
        }
    }

    let Some(serde_json::Value::Object(props)) = obj.get("properties") else {
        return Ok(());
    };

    for (name, value) in args {
        let Some(prop) = props.get(name).and_then(|p| p.as_object()) else {
            tracing::debug!(argument = %name, "argument not in schema, passing through");
            continue;
        };
        let Some(expected) = declared_type(prop) else {
            continue;
        };
        if !type_matches(expected, value) {
            return Err(ToolError::InvalidArguments {
                message: format!("argument `{name}` expected type {expected}"),
            });
        }
    }

    Ok(())
}

/// Declared primary type, unwrapping the `["T", "null"]` and
/// `anyOf: [{T}, {null}]` forms schemars emits for `Option<T>`.
fn declared_type(prop: &serde_json::Map<String, serde_json::Value>) -> Option<&str> {
    if let Some(t) = prop.get("type").and_then(|v| v.as_str()) {
        return Some(t);
    }
    if let Some(arr) = prop.get("type").and_then(|v| v.as_array()) {
        return arr.iter().filter_map(|v| v.as_str()).find(|t| *t != "null");
    }
    prop.get("anyOf")?
        .as_array()?
        .iter()
        .filter_map(|v| v.as_object())
        .filter_map(|o| o.get("type")?.as_str())
        .find(|t| *t != "null")
}

fn type_matches(expected: &str, value: &serde_json::Value) -> bool {
    // Null always passes: it only appears for optional properties.
    if value.is_null() {
        return true;
    }
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}
