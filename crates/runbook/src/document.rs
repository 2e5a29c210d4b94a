// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runbook document model and parsing.
//!
//! A runbook is an ordered list of step templates. Each template names
//! either a concrete `tool` + `args` pair (stub planning reads these
//! verbatim) or a natural-language `prompt` consumed by the toolcaller.

use crate::validate::{validate, RunbookError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source formats a runbook document parses from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

/// One step template within a runbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTemplate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensates: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl StepTemplate {
    /// A template is concrete when the planner can pass it through
    /// without consulting the toolcaller.
    pub fn is_concrete(&self) -> bool {
        self.tool.is_some()
    }

    pub fn args_or_empty(&self) -> serde_json::Value {
        self.args.clone().unwrap_or_else(|| serde_json::Value::Object(Default::default()))
    }
}

/// Expected step used by shadow scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStep {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// A parsed, validated runbook document. Immutable once committed at a
/// version; new versions are new documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunbookDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub steps: Vec<StepTemplate>,
    /// Hint narrowing which tools the planner may emit. Policy still has
    /// the final word.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_allow: Option<Vec<String>>,
    /// Expected step list scored against agent output in shadow mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Vec<ReferenceStep>>,
}

impl RunbookDoc {
    /// Parse and validate from the given format.
    pub fn parse(input: &str, format: Format) -> Result<Self, RunbookError> {
        let doc: RunbookDoc = match format {
            Format::Yaml => serde_yaml::from_str(input)
                .map_err(|e| RunbookError::Parse(e.to_string()))?,
            Format::Json => serde_json::from_str(input)
                .map_err(|e| RunbookError::Parse(e.to_string()))?,
        };
        validate(&doc)?;
        Ok(doc)
    }

    /// Parse from either format; JSON documents start with `{`.
    pub fn parse_auto(input: &str) -> Result<Self, RunbookError> {
        let format = if input.trim_start().starts_with('{') { Format::Json } else { Format::Yaml };
        Self::parse(input, format)
    }

    /// Version string, defaulting to "1" for unversioned documents.
    pub fn version_or_default(&self) -> &str {
        self.version.as_deref().unwrap_or("1")
    }

    pub fn step(&self, index: usize) -> Option<&StepTemplate> {
        self.steps.get(index)
    }

    /// The reference list for shadow scoring: the explicit `reference`
    /// block when present, otherwise every concrete step in order.
    pub fn reference_steps(&self) -> Vec<ReferenceStep> {
        if let Some(reference) = &self.reference {
            return reference.clone();
        }
        self.steps
            .iter()
            .filter_map(|s| {
                s.tool.as_ref().map(|tool| ReferenceStep {
                    tool: tool.clone(),
                    args: s.args_or_empty(),
                })
            })
            .collect()
    }

    /// Map of step name → index, used to resolve `compensates` links.
    pub fn index_by_name(&self) -> HashMap<&str, usize> {
        self.steps.iter().enumerate().map(|(i, s)| (s.name.as_str(), i)).collect()
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
