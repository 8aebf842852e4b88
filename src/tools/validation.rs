//! Argument validation against a tool's declared JSON Schema.

/// Validate an argument value against a tool's parameter schema before the
/// handler runs.
///
/// Top-level validation only: the schema's own type, required-field
/// presence, and declared property types. Returns the first violation as a
/// message suitable for a failed tool outcome. Arguments left as a raw
/// string by a failed stream-end parse fail the object type check here and
/// surface to the model as a paired failure.
pub fn validate_arguments(
    args: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(), String> {
    if schema.get("type").and_then(|t| t.as_str()) == Some("object") && !args.is_object() {
        return Err(format!("expected object arguments, got {}", type_name(args)));
    }

    let Some(fields) = args.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for name in required.iter().filter_map(|n| n.as_str()) {
            if !fields.contains_key(name) {
                return Err(format!("missing required field '{name}'"));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return Ok(());
    };
    for (name, value) in fields {
        let Some(declared) = properties
            .get(name)
            .and_then(|p| p.get("type"))
            .and_then(|t| t.as_str())
        else {
            continue;
        };
        if !matches_type(value, declared) {
            return Err(format!(
                "field '{name}' expected type '{declared}', got {}",
                type_name(value)
            ));
        }
    }

    Ok(())
}

fn matches_type(value: &serde_json::Value, declared: &str) -> bool {
    match declared {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::params::ToolParameters;
    use serde_json::json;

    fn schema() -> serde_json::Value {
        ToolParameters::object()
            .string("url", "target", true)
            .integer("index", "element index", false)
            .string_array("items", "entries", false)
            .build()
            .schema
    }

    #[test]
    fn valid_arguments_pass() {
        let args = json!({"url": "https://example.com", "index": 2});
        assert!(validate_arguments(&args, &schema()).is_ok());
    }

    #[test]
    fn raw_string_arguments_fail_the_object_check() {
        let args = json!("left unparsed by the stream assembler");
        let err = validate_arguments(&args, &schema()).unwrap_err();
        assert!(err.contains("expected object"));
    }

    #[test]
    fn missing_required_field_is_named() {
        let err = validate_arguments(&json!({"index": 2}), &schema()).unwrap_err();
        assert!(err.contains("'url'"));
    }

    #[test]
    fn wrong_property_type_is_named() {
        let err = validate_arguments(&json!({"url": "x", "index": "two"}), &schema()).unwrap_err();
        assert!(err.contains("'index'"));
        assert!(err.contains("integer"));
    }

    #[test]
    fn array_properties_are_type_checked() {
        let ok = json!({"url": "x", "items": ["a"]});
        let bad = json!({"url": "x", "items": "a"});
        assert!(validate_arguments(&ok, &schema()).is_ok());
        assert!(validate_arguments(&bad, &schema()).is_err());
    }

    #[test]
    fn undeclared_fields_are_tolerated() {
        let args = json!({"url": "x", "extra": {"nested": true}});
        assert!(validate_arguments(&args, &schema()).is_ok());
    }

    #[test]
    fn schema_without_type_accepts_anything() {
        assert!(validate_arguments(&json!(null), &json!({})).is_ok());
        assert!(validate_arguments(&json!({"a": 1}), &json!({})).is_ok());
    }
}
