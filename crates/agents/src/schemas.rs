// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output schemas LLM roles must conform to.
//!
//! Non-conforming output is an agent-side retryable error; the schemas are
//! deliberately closed (`additionalProperties: false`) so drift in model
//! output fails loudly instead of leaking unknown fields downstream.

use serde_json::{json, Value};
use std::sync::LazyLock;

/// `{steps: [{name, tool, args}]}`
pub static PLANNER_OUT: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "properties": {
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "tool": {"type": "string"},
                        "args": {"type": "object"},
                    },
                    "required": ["name", "tool", "args"],
                    "additionalProperties": false,
                },
            },
        },
        "required": ["steps"],
        "additionalProperties": false,
    })
});

/// `{tool, args, confidence, rationale}`
pub static TOOLCALLER_OUT: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "properties": {
            "tool": {"type": "string"},
            "args": {"type": "object"},
            "confidence": {"type": "number", "minimum": 0, "maximum": 1},
            "rationale": {"type": "string"},
        },
        "required": ["tool", "args", "confidence", "rationale"],
        "additionalProperties": false,
    })
});

/// `{decision, reasons}`
pub static REVIEWER_OUT: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "properties": {
            "decision": {"type": "string", "enum": ["allow", "block", "require_approval"]},
            "reasons": {
                "type": "array",
                "items": {"type": "string"},
            },
        },
        "required": ["decision", "reasons"],
        "additionalProperties": false,
    })
});
