// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argument schema validation.
//!
//! Covers the JSON-schema subset the registered tool schemas actually
//! use: `type`, `required`, `properties`, `additionalProperties` (bool),
//! `enum`, `minLength`, `minimum`, `maximum`, plus a non-standard
//! `secret` annotation consumed by audit redaction. Violations carry the
//! failing location as an RFC 6901 JSON pointer.

use serde_json::Value;

/// First failing location in an argument object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// RFC 6901 pointer, e.g. `/title` or `/labels/0`.
    pub pointer: String,
    pub message: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.pointer, self.message)
    }
}

/// Validate `args` against an adapter schema. Returns the first violation.
pub fn validate_args(schema: &Value, args: &Value) -> Result<(), SchemaViolation> {
    check(schema, args, String::new())
}

/// Argument names marked `secret: true` anywhere in the schema's
/// properties, recursively.
pub fn secret_keys(schema: &Value) -> Vec<String> {
    let mut keys = Vec::new();
    collect_secret_keys(schema, &mut keys);
    keys
}

fn collect_secret_keys(schema: &Value, keys: &mut Vec<String>) {
    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for (name, prop) in props {
            if prop.get("secret").and_then(Value::as_bool) == Some(true) {
                keys.push(name.clone());
            }
            collect_secret_keys(prop, keys);
        }
    }
}

fn check(schema: &Value, value: &Value, pointer: String) -> Result<(), SchemaViolation> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !type_matches(expected, value) {
            return Err(SchemaViolation {
                pointer: root_or(&pointer),
                message: format!("expected {expected}, got {}", type_name(value)),
            });
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(SchemaViolation {
                pointer: root_or(&pointer),
                message: format!("value not in enum {allowed:?}"),
            });
        }
    }

    if let Some(min_length) = schema.get("minLength").and_then(Value::as_u64) {
        if let Some(s) = value.as_str() {
            if (s.chars().count() as u64) < min_length {
                return Err(SchemaViolation {
                    pointer: root_or(&pointer),
                    message: format!("shorter than minLength {min_length}"),
                });
            }
        }
    }

    if let Some(minimum) = schema.get("minimum").and_then(Value::as_f64) {
        if let Some(n) = value.as_f64() {
            if n < minimum {
                return Err(SchemaViolation {
                    pointer: root_or(&pointer),
                    message: format!("below minimum {minimum}"),
                });
            }
        }
    }

    if let Some(maximum) = schema.get("maximum").and_then(Value::as_f64) {
        if let Some(n) = value.as_f64() {
            if n > maximum {
                return Err(SchemaViolation {
                    pointer: root_or(&pointer),
                    message: format!("above maximum {maximum}"),
                });
            }
        }
    }

    if let Some(object) = value.as_object() {
        let properties = schema.get("properties").and_then(Value::as_object);

        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(name) {
                    return Err(SchemaViolation {
                        pointer: format!("{pointer}/{name}"),
                        message: "required property missing".into(),
                    });
                }
            }
        }

        if schema.get("additionalProperties").and_then(Value::as_bool) == Some(false) {
            if let Some(properties) = properties {
                for key in object.keys() {
                    if !properties.contains_key(key) {
                        return Err(SchemaViolation {
                            pointer: format!("{pointer}/{key}"),
                            message: "unexpected property".into(),
                        });
                    }
                }
            }
        }

        if let Some(properties) = properties {
            for (name, prop_schema) in properties {
                if let Some(prop_value) = object.get(name) {
                    check(prop_schema, prop_value, format!("{pointer}/{name}"))?;
                }
            }
        }
    }

    if let Some(items) = value.as_array() {
        if let Some(item_schema) = schema.get("items") {
            for (i, item) in items.iter().enumerate() {
                check(item_schema, item, format!("{pointer}/{i}"))?;
            }
        }
    }

    Ok(())
}

fn root_or(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
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
#[path = "schema_tests.rs"]
mod tests;
