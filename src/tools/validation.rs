//! Check tool call arguments against the tool's declared schema.

use serde_json::Value;

/// Validate tool arguments against a JSON Schema.
///
/// Covers the subset tools here declare: object type, required fields,
/// per-property types, string enums, and nested objects. Returns the first
/// violation found as a human-readable message.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    // Engines omit the argument object for parameterless tools.
    let expects_object = schema.get("type").and_then(Value::as_str) == Some("object");
    if args.is_null() && expects_object {
        return validate_at("", &Value::Object(Default::default()), schema);
    }
    validate_at("", args, schema)
}

fn validate_at(path: &str, value: &Value, schema: &Value) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !value_matches_type(value, expected) {
            return Err(match path {
                "" => format!("expected {expected} arguments, got {}", json_type_name(value)),
                field => format!(
                    "field '{field}' expected type '{expected}', got {}",
                    json_type_name(value)
                ),
            });
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(format!("field '{path}' must be one of {}", Value::Array(allowed.clone())));
        }
    }

    let Some(obj) = value.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !obj.contains_key(name) {
                return Err(format!("missing required field '{}'", join_path(path, name)));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, field_value) in obj {
            if let Some(prop_schema) = properties.get(key) {
                validate_at(&join_path(path, key), field_value, prop_schema)?;
            }
        }
    }

    Ok(())
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
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

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exchange_rate_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "base_currency": { "type": "string" },
                "target_currency": { "type": "string" },
            },
            "required": ["base_currency", "target_currency"],
        })
    }

    #[test]
    fn rejects_non_object_args_when_schema_expects_object() {
        let err = validate_arguments(&json!("USD"), &exchange_rate_schema()).unwrap_err();
        assert!(err.contains("expected object arguments"));
    }

    #[test]
    fn rejects_missing_required_field() {
        let err = validate_arguments(&json!({ "base_currency": "USD" }), &exchange_rate_schema())
            .unwrap_err();
        assert!(err.contains("missing required field 'target_currency'"));
    }

    #[test]
    fn accepts_complete_arguments_and_extra_fields() {
        let args = json!({ "base_currency": "USD", "target_currency": "EUR", "note": true });
        assert!(validate_arguments(&args, &exchange_rate_schema()).is_ok());
    }

    #[test]
    fn rejects_number_where_string_expected() {
        let args = json!({ "base_currency": 1, "target_currency": "EUR" });
        let err = validate_arguments(&args, &exchange_rate_schema()).unwrap_err();
        assert!(err.contains("field 'base_currency' expected type 'string'"));
    }

    #[test]
    fn integer_rejects_fractional_numbers() {
        let schema = json!({
            "type": "object",
            "properties": { "count": { "type": "integer" } },
            "required": ["count"],
        });
        assert!(validate_arguments(&json!({ "count": 3 }), &schema).is_ok());
        assert!(validate_arguments(&json!({ "count": 3.5 }), &schema).is_err());
    }

    #[test]
    fn enum_values_are_enforced() {
        let schema = json!({
            "type": "object",
            "properties": { "method": { "type": "string", "enum": ["bank transfer", "gold debit card"] } },
        });
        assert!(validate_arguments(&json!({ "method": "bank transfer" }), &schema).is_ok());
        let err = validate_arguments(&json!({ "method": "cash" }), &schema).unwrap_err();
        assert!(err.contains("must be one of"));
    }

    #[test]
    fn nested_objects_report_dotted_paths() {
        let schema = json!({
            "type": "object",
            "properties": {
                "payment": {
                    "type": "object",
                    "properties": { "amount": { "type": "number" } },
                    "required": ["amount"],
                },
            },
        });
        let err = validate_arguments(&json!({ "payment": {} }), &schema).unwrap_err();
        assert!(err.contains("'payment.amount'"));
    }

    #[test]
    fn null_arguments_satisfy_parameterless_tools() {
        let schema = json!({ "type": "object", "properties": {}, "required": [] });
        assert!(validate_arguments(&Value::Null, &schema).is_ok());
    }

    #[test]
    fn null_arguments_still_need_required_fields() {
        let err = validate_arguments(&Value::Null, &exchange_rate_schema()).unwrap_err();
        assert!(err.contains("missing required field 'base_currency'"));
    }

    #[test]
    fn empty_schema_accepts_anything() {
        assert!(validate_arguments(&json!({ "anything": 42 }), &json!({})).is_ok());
    }
}
