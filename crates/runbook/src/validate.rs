// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural validation for parsed runbook documents.

use crate::document::RunbookDoc;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

/// Tool identifiers are dotted, lower-case, stable. Wildcards are not
/// tools; they appear only in policy allowlists.
#[allow(clippy::expect_used)]
pub static TOOL_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]*(\.[a-z][a-z0-9_]*)+$").expect("constant regex pattern is valid")
});

/// Errors raised while parsing or validating a runbook document.
#[derive(Debug, Error)]
pub enum RunbookError {
    #[error("runbook parse error: {0}")]
    Parse(String),
    #[error("runbook invalid: {0}")]
    Invalid(String),
}

/// Check the structural invariants the executor relies on.
pub fn validate(doc: &RunbookDoc) -> Result<(), RunbookError> {
    if doc.name.trim().is_empty() {
        return Err(RunbookError::Invalid("name must not be empty".into()));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for (index, step) in doc.steps.iter().enumerate() {
        if step.name.trim().is_empty() {
            return Err(RunbookError::Invalid(format!("step {index} has an empty name")));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(RunbookError::Invalid(format!(
                "duplicate step name {:?}",
                step.name
            )));
        }

        match (&step.tool, &step.prompt) {
            (None, None) => {
                return Err(RunbookError::Invalid(format!(
                    "step {:?} needs either tool+args or prompt",
                    step.name
                )));
            }
            (Some(tool), _) => {
                if !TOOL_ID_PATTERN.is_match(tool) {
                    return Err(RunbookError::Invalid(format!(
                        "step {:?} tool {:?} is not a dotted lower-case identifier",
                        step.name, tool
                    )));
                }
                if let Some(args) = &step.args {
                    if !args.is_object() {
                        return Err(RunbookError::Invalid(format!(
                            "step {:?} args must be a mapping",
                            step.name
                        )));
                    }
                }
            }
            (None, Some(prompt)) => {
                if prompt.trim().is_empty() {
                    return Err(RunbookError::Invalid(format!(
                        "step {:?} prompt must not be empty",
                        step.name
                    )));
                }
            }
        }

        if let Some(timeout_ms) = step.timeout_ms {
            if timeout_ms == 0 {
                return Err(RunbookError::Invalid(format!(
                    "step {:?} timeout_ms must be positive",
                    step.name
                )));
            }
        }

        // compensates must point at an earlier step so the reverse walk
        // terminates
        if let Some(target) = &step.compensates {
            let target_index = doc.steps[..index].iter().position(|s| &s.name == target);
            if target_index.is_none() {
                return Err(RunbookError::Invalid(format!(
                    "step {:?} compensates unknown earlier step {:?}",
                    step.name, target
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
