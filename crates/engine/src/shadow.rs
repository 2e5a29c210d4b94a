// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shadow comparator: scores an agent-produced intent list against a
//! reference list. Never calls adapters.

use fm_adapters::Intent;
use fm_runbook::ReferenceStep;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

/// `${var}` placeholders inside reference strings template-match any
/// non-empty substring.
#[allow(clippy::expect_used)]
static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{[a-zA-Z_][a-zA-Z0-9_.]*\}").expect("constant regex pattern is valid")
});

/// Per-index comparison detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCompare {
    pub index: usize,
    pub agent_tool: Option<String>,
    pub reference_tool: Option<String>,
    pub tool_match: bool,
    pub args_match: bool,
}

/// Scalar scores plus per-step detail for one shadow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowReport {
    /// Aligned tool+args matches over the reference length.
    pub match_rate: f64,
    /// Reference tools absent from the agent list, over reference length.
    pub missing_rate: f64,
    /// Agent tools absent from the reference, over agent length.
    pub hallucination_rate: f64,
    /// Weighted composite: 0.5 tool + 0.3 args + 0.2 order.
    pub match_score: f64,
    pub step_compare: Vec<StepCompare>,
}

impl ShadowReport {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Expected-key subset check: every expected key exists in actual with an
/// equal value; strings may template-match via `${var}` placeholders.
pub fn args_subset(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            expected.iter().all(|(key, expected_value)| {
                actual.get(key).is_some_and(|actual_value| {
                    value_matches(expected_value, actual_value)
                })
            })
        }
        _ => expected == actual,
    }
}

fn value_matches(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::String(e), Value::String(a)) => string_matches(e, a),
        (Value::Object(_), Value::Object(_)) => args_subset(expected, actual),
        _ => expected == actual,
    }
}

fn string_matches(expected: &str, actual: &str) -> bool {
    if !VAR_PATTERN.is_match(expected) {
        return expected == actual;
    }
    // build an anchored regex with placeholders as wildcards
    let mut pattern = String::from("^");
    let mut last = 0;
    for found in VAR_PATTERN.find_iter(expected) {
        pattern.push_str(&regex::escape(&expected[last..found.start()]));
        pattern.push_str(".+");
        last = found.end();
    }
    pattern.push_str(&regex::escape(&expected[last..]));
    pattern.push('$');
    Regex::new(&pattern).map(|re| re.is_match(actual)).unwrap_or(false)
}

/// Score agent intents A against reference list R.
pub fn compare(agent: &[Intent], reference: &[ReferenceStep]) -> ShadowReport {
    let reference_len = reference.len().max(1);
    let agent_len = agent.len().max(1);

    let mut aligned_matches = 0usize;
    for (i, r) in reference.iter().enumerate() {
        if let Some(a) = agent.get(i) {
            if a.tool == r.tool && args_subset(&r.args, &a.args) {
                aligned_matches += 1;
            }
        }
    }
    let match_rate = aligned_matches as f64 / reference_len as f64;

    let missing = reference
        .iter()
        .filter(|r| !agent.iter().any(|a| a.tool == r.tool))
        .count();
    let missing_rate = missing as f64 / reference_len as f64;

    let hallucinated = agent
        .iter()
        .filter(|a| !reference.iter().any(|r| r.tool == a.tool))
        .count();
    let hallucination_rate = hallucinated as f64 / agent_len as f64;

    // weighted composite over the longer of the two lists
    let total = agent.len().max(reference.len()).max(1);
    let mut tool_matches = 0usize;
    let mut args_matches = 0usize;
    let mut step_compare = Vec::with_capacity(total);
    for i in 0..agent.len().max(reference.len()) {
        let a = agent.get(i);
        let r = reference.get(i);
        let tool_match =
            matches!((a, r), (Some(a), Some(r)) if a.tool == r.tool);
        let args_match = match (a, r) {
            (Some(a), Some(r)) => tool_match && args_subset(&r.args, &a.args),
            _ => false,
        };
        if tool_match {
            tool_matches += 1;
        }
        if args_match {
            args_matches += 1;
        }
        step_compare.push(StepCompare {
            index: i,
            agent_tool: a.map(|a| a.tool.clone()),
            reference_tool: r.map(|r| r.tool.clone()),
            tool_match,
            args_match,
        });
    }
    let tool_score = tool_matches as f64 / total as f64;
    let args_score = args_matches as f64 / total as f64;
    // with index alignment the order component coincides with tool agreement
    let order_score = tool_score;
    let match_score = 0.5 * tool_score + 0.3 * args_score + 0.2 * order_score;

    ShadowReport { match_rate, missing_rate, hallucination_rate, match_score, step_compare }
}

#[cfg(test)]
#[path = "shadow_tests.rs"]
mod tests;
