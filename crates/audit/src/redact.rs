// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret redaction applied before hashing, logging, and responses.
//!
//! Redacted fields become `{"redacted": HMAC-SHA256(salt, value)}` so
//! absence of the secret is verifiable without leaking content.

use hmac::{Hmac, Mac};
use regex::Regex;
use serde_json::{Map, Value};
use sha2::Sha256;
use std::sync::LazyLock;

type HmacSha256 = Hmac<Sha256>;

/// Key names that carry credentials regardless of value shape.
#[allow(clippy::expect_used)]
static SECRET_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(authorization|x-api-key|api[_-]?key|token|secret|password|credential[s]?|private[_-]?key)$")
        .expect("constant regex pattern is valid")
});

/// Values only count as secrets when long enough to be one.
const SECRET_VALUE_MIN_LEN: usize = 20;

/// Redaction policy: built-in key patterns plus configured value regexes
/// and per-call schema-marked argument keys.
#[derive(Debug, Clone, Default)]
pub struct RedactionConfig {
    /// Regexes matched against string values longer than 20 chars.
    pub value_patterns: Vec<Regex>,
}

impl RedactionConfig {
    /// Patterns for the common cloud token shapes the original gateway
    /// shipped with.
    #[allow(clippy::expect_used)]
    pub fn standard() -> Self {
        let patterns = [
            r"^gh[pousr]_[A-Za-z0-9]{16,}$",
            r"^sk-[A-Za-z0-9_-]{16,}$",
            r"^xox[baprs]-[A-Za-z0-9-]{10,}$",
            r"^eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+$",
            r"^AKIA[0-9A-Z]{16}$",
        ];
        Self {
            value_patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("constant regex pattern is valid"))
                .collect(),
        }
    }

    fn value_is_secret(&self, s: &str) -> bool {
        s.len() > SECRET_VALUE_MIN_LEN && self.value_patterns.iter().any(|re| re.is_match(s))
    }
}

/// Keyed digest of a redacted value.
pub fn redacted_digest(salt: &str, value: &Value) -> String {
    // HMAC accepts any key length
    #[allow(clippy::expect_used)]
    let mut mac =
        HmacSha256::new_from_slice(salt.as_bytes()).expect("hmac accepts any key length");
    mac.update(crate::canonical::canonicalize(value).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn redaction_marker(salt: &str, value: &Value) -> Value {
    let mut map = Map::new();
    map.insert("redacted".into(), Value::String(redacted_digest(salt, value)));
    Value::Object(map)
}

/// Recursively redact a payload.
///
/// `secret_keys` are exact argument names the invoked adapter's schema
/// marks `secret`; they redact at any nesting depth.
pub fn redact(value: &Value, config: &RedactionConfig, salt: &str, secret_keys: &[String]) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, val) in map {
                let key_is_secret = SECRET_KEY_PATTERN.is_match(key)
                    || secret_keys.iter().any(|k| k == key);
                if key_is_secret && !val.is_null() {
                    out.insert(key.clone(), redaction_marker(salt, val));
                } else {
                    out.insert(key.clone(), redact(val, config, salt, secret_keys));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| redact(v, config, salt, secret_keys)).collect())
        }
        Value::String(s) if config.value_is_secret(s) => redaction_marker(salt, value),
        other => other.clone(),
    }
}

#[cfg(test)]
#[path = "redact_tests.rs"]
mod tests;
