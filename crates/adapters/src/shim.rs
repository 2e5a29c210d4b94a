// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op shim used by shadow runs: records intent, makes no external call.

use crate::contract::Invocation;
use fm_core::Usage;
use parking_lot::Mutex;
use serde_json::{json, Value};

/// One recorded would-be invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub tool: String,
    pub args: Value,
}

/// Collects the intent list a shadow run produces. The comparator scores
/// this list against the runbook's reference list.
#[derive(Default)]
pub struct IntentRecorder {
    intents: Mutex<Vec<Intent>>,
}

impl IntentRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an intent and synthesize a successful invocation.
    pub fn record(&self, tool: &str, args: &Value) -> Invocation {
        self.intents.lock().push(Intent { tool: tool.to_string(), args: args.clone() });
        Invocation {
            output: json!({"recorded": true, "tool": tool}),
            usage: Usage::default(),
        }
    }

    pub fn intents(&self) -> Vec<Intent> {
        self.intents.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.intents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "shim_tests.rs"]
mod tests;
