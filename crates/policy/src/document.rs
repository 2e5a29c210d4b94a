// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy document model and parsing.

use crate::glob;
use crate::precondition::Precondition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while parsing or validating a policy document.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy parse error: {0}")]
    Parse(String),
    #[error("policy invalid: {0}")]
    Invalid(String),
}

/// Per-run budget caps. Absent caps are unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Budgets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cost_per_run_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens_per_run: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wall_ms_per_run: Option<u64>,
}

fn default_quorum() -> u32 {
    1
}

fn default_expiry_seconds() -> u64 {
    3600
}

/// Marks a (tool-glob, roles) combination as requiring human sign-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub tool: String,
    #[serde(default)]
    pub requires_roles: Vec<String>,
    #[serde(default = "default_quorum")]
    pub quorum: u32,
    #[serde(default = "default_expiry_seconds")]
    pub expiry_seconds: u64,
    /// Disables the four-eyes rule for this rule when true.
    #[serde(default)]
    pub allow_self: bool,
}

/// A named, versioned policy document. Runs capture the full document at
/// start; later edits never retro-change a run's decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDoc {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// role → tool-glob list; `*` only in the trailing segment.
    #[serde(default)]
    pub tool_allowlist: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub budgets: Budgets,
    #[serde(default)]
    pub approval_rules: Vec<ApprovalRule>,
    #[serde(default)]
    pub preconditions: Vec<Precondition>,
}

impl PolicyDoc {
    /// Parse from YAML (the original document format) with validation.
    pub fn from_yaml(input: &str) -> Result<Self, PolicyError> {
        let doc: PolicyDoc =
            serde_yaml::from_str(input).map_err(|e| PolicyError::Parse(e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn from_json(input: &str) -> Result<Self, PolicyError> {
        let doc: PolicyDoc =
            serde_json::from_str(input).map_err(|e| PolicyError::Parse(e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    fn validate(&self) -> Result<(), PolicyError> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::Invalid("name must not be empty".into()));
        }
        if self.version.trim().is_empty() {
            return Err(PolicyError::Invalid("version must not be empty".into()));
        }
        for (role, patterns) in &self.tool_allowlist {
            for pattern in patterns {
                if !glob::is_valid_pattern(pattern) {
                    return Err(PolicyError::Invalid(format!(
                        "allowlist for role {role:?} has invalid glob {pattern:?} \
                         (wildcard only in trailing segment)"
                    )));
                }
            }
        }
        for rule in &self.approval_rules {
            if !glob::is_valid_pattern(&rule.tool) {
                return Err(PolicyError::Invalid(format!(
                    "approval rule has invalid glob {:?}",
                    rule.tool
                )));
            }
            if rule.quorum == 0 {
                return Err(PolicyError::Invalid("approval quorum must be at least 1".into()));
            }
        }
        for precondition in &self.preconditions {
            precondition.validate().map_err(PolicyError::Invalid)?;
        }
        Ok(())
    }

    /// Whether `tool` matches any allowlist glob for any of `roles`.
    pub fn tool_allowed(&self, roles: &[String], tool: &str) -> bool {
        roles.iter().any(|role| {
            self.tool_allowlist
                .get(role)
                .is_some_and(|patterns| patterns.iter().any(|p| glob::tool_glob_matches(p, tool)))
        })
    }

    /// Whether `tool` appears in any allowlist or approval rule at all.
    /// Tools unknown to every rule fall back to `POLICY_DEFAULT_ACTION`.
    pub fn tool_known(&self, tool: &str) -> bool {
        let in_allowlist = self
            .tool_allowlist
            .values()
            .any(|patterns| patterns.iter().any(|p| glob::tool_glob_matches(p, tool)));
        in_allowlist
            || self.approval_rules.iter().any(|r| glob::tool_glob_matches(&r.tool, tool))
    }

    /// First approval rule matching `tool`, if any.
    pub fn approval_rule_for(&self, tool: &str) -> Option<&ApprovalRule> {
        self.approval_rules.iter().find(|r| glob::tool_glob_matches(&r.tool, tool))
    }

    /// Defensive JSON copy captured onto the run at submit time.
    pub fn snapshot_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
