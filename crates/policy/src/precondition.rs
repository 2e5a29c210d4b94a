// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative precondition predicates evaluated against run context and args.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator for a precondition expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    #[serde(alias = "=", alias = "==")]
    Eq,
    #[serde(alias = "!=")]
    Ne,
    In,
    NotIn,
    Matches,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Le,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Ge,
}

/// A named predicate. `path` addresses into the run context or the step
/// args with a `context.` / `args.` prefix followed by dotted keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precondition {
    pub name: String,
    pub path: String,
    pub op: Op,
    pub value: Value,
}

impl Precondition {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("precondition name must not be empty".into());
        }
        let root = self.path.split('.').next().unwrap_or("");
        if root != "context" && root != "args" {
            return Err(format!(
                "precondition {:?} path must start with context. or args.",
                self.name
            ));
        }
        if self.op == Op::Matches {
            let pattern = self.value.as_str().ok_or_else(|| {
                format!("precondition {:?}: matches needs a string pattern", self.name)
            })?;
            Regex::new(pattern)
                .map_err(|e| format!("precondition {:?}: bad pattern: {e}", self.name))?;
        }
        Ok(())
    }

    /// Evaluate against the run context and concrete step args.
    ///
    /// A missing path never satisfies the predicate; blocks fire when a
    /// predicate FAILS, so absent keys block rather than silently pass.
    pub fn holds(&self, context: &Value, args: &Value) -> bool {
        let Some(actual) = self.resolve(context, args) else {
            return false;
        };
        match self.op {
            Op::Eq => actual == &self.value,
            Op::Ne => actual != &self.value,
            Op::In => match &self.value {
                Value::Array(items) => items.contains(actual),
                other => values_as_str_contains(other, actual),
            },
            Op::NotIn => match &self.value {
                Value::Array(items) => !items.contains(actual),
                other => !values_as_str_contains(other, actual),
            },
            Op::Matches => match (actual.as_str(), self.value.as_str()) {
                // pattern validity checked at parse time
                (Some(actual), Some(pattern)) => {
                    Regex::new(pattern).map(|re| re.is_match(actual)).unwrap_or(false)
                }
                _ => false,
            },
            Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                let (Some(a), Some(b)) = (actual.as_f64(), self.value.as_f64()) else {
                    return false;
                };
                match self.op {
                    Op::Lt => a < b,
                    Op::Le => a <= b,
                    Op::Gt => a > b,
                    Op::Ge => a >= b,
                    _ => unreachable!(),
                }
            }
        }
    }

    fn resolve<'a>(&self, context: &'a Value, args: &'a Value) -> Option<&'a Value> {
        let mut parts = self.path.split('.');
        let root = match parts.next()? {
            "context" => context,
            "args" => args,
            _ => return None,
        };
        parts.try_fold(root, |value, key| value.get(key))
    }
}

fn values_as_str_contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack.as_str(), needle.as_str()) {
        (Some(h), Some(n)) => h.contains(n),
        _ => false,
    }
}

#[cfg(test)]
#[path = "precondition_tests.rs"]
mod tests;
