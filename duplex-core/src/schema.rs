//! Embedded JSON Schema validation for tool inputs.
//!
//! Covers the draft 2020-12 subset the protocol needs for object-shaped tool
//! arguments: `type` (including union arrays), `properties`, `required`,
//! `enum`, `minimum`/`maximum`, `items`, and `default`. Full dialect
//! compliance is a non-goal; anything the subset does not understand is
//! accepted.
//!
//! Violations carry a JSON-pointer style instance path (`/b`, `/items/1`)
//! that ends up in the `instancePath` field of wire validation errors.

use serde_json::{Map, Value};

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON-pointer path of the offending value; empty string for the root.
    pub instance_path: String,
    /// What went wrong.
    pub message: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// Validate `instance` against `schema`.
///
/// Returns every violation found rather than stopping at the first.
pub fn validate(schema: &Value, instance: &Value) -> Result<(), Vec<SchemaViolation>> {
    let mut violations = Vec::new();
    check(schema, instance, "", &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Fill in `default` values for absent object properties, then validate.
///
/// Returns the augmented instance on success so callers hand handlers the
/// arguments the schema author intended.
pub fn apply_defaults_and_validate(
    schema: &Value,
    instance: &Value,
) -> Result<Value, Vec<SchemaViolation>> {
    let mut instance = instance.clone();
    apply_defaults(schema, &mut instance);
    validate(schema, &instance)?;
    Ok(instance)
}

fn apply_defaults(schema: &Value, instance: &mut Value) {
    let Some(schema_obj) = schema.as_object() else {
        return;
    };
    let Some(properties) = schema_obj.get("properties").and_then(Value::as_object) else {
        return;
    };
    let Some(instance_obj) = instance.as_object_mut() else {
        return;
    };

    for (name, property_schema) in properties {
        match instance_obj.get_mut(name) {
            Some(value) => apply_defaults(property_schema, value),
            None => {
                if let Some(default) = property_schema.get("default") {
                    instance_obj.insert(name.clone(), default.clone());
                }
            }
        }
    }
}

fn check(schema: &Value, instance: &Value, path: &str, violations: &mut Vec<SchemaViolation>) {
    // Boolean schemas: `true` accepts everything, `false` rejects everything.
    if let Some(accept) = schema.as_bool() {
        if !accept {
            violations.push(SchemaViolation {
                instance_path: path.to_string(),
                message: "schema rejects all values".to_string(),
            });
        }
        return;
    }

    let Some(schema_obj) = schema.as_object() else {
        return;
    };

    if let Some(type_constraint) = schema_obj.get("type") {
        if !type_matches(type_constraint, instance) {
            violations.push(SchemaViolation {
                instance_path: path.to_string(),
                message: format!(
                    "expected type {}, got {}",
                    type_constraint_name(type_constraint),
                    json_type_name(instance)
                ),
            });
            // Further keyword checks against the wrong type only produce noise.
            return;
        }
    }

    if let Some(allowed) = schema_obj.get("enum").and_then(Value::as_array) {
        if !allowed.contains(instance) {
            violations.push(SchemaViolation {
                instance_path: path.to_string(),
                message: format!("value is not one of the allowed values {allowed:?}"),
            });
        }
    }

    match instance {
        Value::Object(obj) => check_object(schema_obj, obj, path, violations),
        Value::Array(items) => check_array(schema_obj, items, path, violations),
        Value::Number(n) => check_number(schema_obj, n, path, violations),
        _ => {}
    }
}

fn check_object(
    schema: &Map<String, Value>,
    obj: &Map<String, Value>,
    path: &str,
    violations: &mut Vec<SchemaViolation>,
) {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !obj.contains_key(field) {
                violations.push(SchemaViolation {
                    instance_path: format!("{path}/{field}"),
                    message: format!("missing required field: {field}"),
                });
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, value) in obj {
            if let Some(property_schema) = properties.get(name) {
                check(property_schema, value, &format!("{path}/{name}"), violations);
            }
        }
    }
}

fn check_array(
    schema: &Map<String, Value>,
    items: &[Value],
    path: &str,
    violations: &mut Vec<SchemaViolation>,
) {
    if let Some(item_schema) = schema.get("items") {
        for (index, item) in items.iter().enumerate() {
            check(item_schema, item, &format!("{path}/{index}"), violations);
        }
    }
}

fn check_number(
    schema: &Map<String, Value>,
    number: &serde_json::Number,
    path: &str,
    violations: &mut Vec<SchemaViolation>,
) {
    let Some(value) = number.as_f64() else {
        return;
    };

    if let Some(minimum) = schema.get("minimum").and_then(Value::as_f64) {
        if value < minimum {
            violations.push(SchemaViolation {
                instance_path: path.to_string(),
                message: format!("value {value} is below the minimum {minimum}"),
            });
        }
    }
    if let Some(maximum) = schema.get("maximum").and_then(Value::as_f64) {
        if value > maximum {
            violations.push(SchemaViolation {
                instance_path: path.to_string(),
                message: format!("value {value} is above the maximum {maximum}"),
            });
        }
    }
}

fn type_matches(constraint: &Value, instance: &Value) -> bool {
    match constraint {
        Value::String(name) => single_type_matches(name, instance),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| single_type_matches(name, instance)),
        _ => true,
    }
}

fn single_type_matches(name: &str, instance: &Value) -> bool {
    match name {
        "string" => instance.is_string(),
        "number" => instance.is_number(),
        "integer" => instance.is_i64() || instance.is_u64(),
        "boolean" => instance.is_boolean(),
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "null" => instance.is_null(),
        _ => true,
    }
}

fn type_constraint_name(constraint: &Value) -> String {
    match constraint {
        Value::String(name) => name.clone(),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" | "),
        _ => "unknown".to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_matching_object() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
            "required": ["a", "b"]
        });
        assert!(validate(&schema, &json!({"a": 5, "b": 3})).is_ok());
    }

    #[test]
    fn missing_required_field_reports_pointer_path() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
            "required": ["a", "b"]
        });
        let violations = validate(&schema, &json!({"a": 5})).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].instance_path, "/b");
    }

    #[test]
    fn type_mismatch_is_reported() {
        let schema = json!({"type": "object", "properties": {"a": {"type": "number"}}});
        let violations = validate(&schema, &json!({"a": "five"})).unwrap_err();
        assert_eq!(violations[0].instance_path, "/a");
        assert!(violations[0].message.contains("expected type number"));
    }

    #[test]
    fn integer_rejects_fractional() {
        let schema = json!({"type": "integer"});
        assert!(validate(&schema, &json!(3)).is_ok());
        assert!(validate(&schema, &json!(3.5)).is_err());
    }

    #[test]
    fn union_types() {
        let schema = json!({"type": ["string", "number"]});
        assert!(validate(&schema, &json!("x")).is_ok());
        assert!(validate(&schema, &json!(1)).is_ok());
        assert!(validate(&schema, &json!(true)).is_err());
    }

    #[test]
    fn enum_constraint() {
        let schema = json!({"enum": ["red", "green"]});
        assert!(validate(&schema, &json!("red")).is_ok());
        assert!(validate(&schema, &json!("blue")).is_err());
    }

    #[test]
    fn numeric_bounds() {
        let schema = json!({"type": "number", "minimum": 0, "maximum": 10});
        assert!(validate(&schema, &json!(0)).is_ok());
        assert!(validate(&schema, &json!(10)).is_ok());
        assert!(validate(&schema, &json!(-1)).is_err());
        assert!(validate(&schema, &json!(11)).is_err());
    }

    #[test]
    fn nested_path_through_arrays() {
        let schema = json!({
            "type": "object",
            "properties": {"items": {"type": "array", "items": {"type": "integer"}}}
        });
        let violations = validate(&schema, &json!({"items": [1, "two", 3]})).unwrap_err();
        assert_eq!(violations[0].instance_path, "/items/1");
    }

    #[test]
    fn boolean_schemas() {
        assert!(validate(&json!(true), &json!("anything")).is_ok());
        assert!(validate(&json!(false), &json!("anything")).is_err());
    }

    #[test]
    fn multiple_violations_collected() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
            "required": ["a", "b"]
        });
        let violations = validate(&schema, &json!({})).unwrap_err();
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn defaults_fill_absent_properties() {
        let schema = json!({
            "type": "object",
            "properties": {
                "verbose": {"type": "boolean", "default": false},
                "count": {"type": "integer"}
            },
            "required": ["count"]
        });
        let filled = apply_defaults_and_validate(&schema, &json!({"count": 2})).unwrap();
        assert_eq!(filled, json!({"count": 2, "verbose": false}));
    }

    #[test]
    fn defaults_do_not_override_present_values() {
        let schema = json!({
            "type": "object",
            "properties": {"verbose": {"type": "boolean", "default": false}}
        });
        let filled = apply_defaults_and_validate(&schema, &json!({"verbose": true})).unwrap();
        assert_eq!(filled, json!({"verbose": true}));
    }
}
