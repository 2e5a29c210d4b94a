// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical JSON for hashing.
//!
//! Deterministic key ordering, no insignificant whitespace, serde_json's
//! numeric representation, times as RFC 3339 UTC strings. This rendering
//! is the compatibility surface of the audit chain: a byte change here
//! breaks verification of existing chains.

use serde_json::Value;

/// Render a JSON value canonically: object keys sorted recursively,
/// compact separators.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                // key came from the map it indexes
                write_value(out, &map[key.as_str()]);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        // scalar rendering delegates to serde_json so numbers keep a
        // single consistent representation
        other => {
            out.push_str(&other.to_string());
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push_str(&Value::String(s.to_string()).to_string());
}

#[cfg(test)]
#[path = "canonical_tests.rs"]
mod tests;
