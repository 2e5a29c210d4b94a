// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The policy decision point.
//!
//! Every effector call is mediated here. The decision procedure is a
//! deterministic total order; blocks always win over approvals, approvals
//! always win over allows, and reasons accumulate in rule-firing order.

use crate::document::{ApprovalRule, PolicyDoc};
use fm_core::RunMetrics;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome class for one (subject, tool, args, context) evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    RequireApproval,
    Block,
}

impl Decision {
    fn rank(&self) -> u8 {
        match self {
            Decision::Allow => 0,
            Decision::RequireApproval => 1,
            Decision::Block => 2,
        }
    }

    /// The stricter of two decisions.
    pub fn strictest(self, other: Decision) -> Decision {
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }
}

fm_core::simple_display! {
    Decision {
        Allow => "allow",
        RequireApproval => "require_approval",
        Block => "block",
    }
}

/// What happens to tools unknown to every policy rule.
/// Wired from the `POLICY_DEFAULT_ACTION` environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultAction {
    #[default]
    Block,
    Allow,
}

impl DefaultAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "block" => Some(DefaultAction::Block),
            "allow" => Some(DefaultAction::Allow),
            _ => None,
        }
    }
}

/// Adapter-derived inputs the evaluator cannot compute itself.
///
/// The registry owns argument schemas and classifications; the engine
/// resolves them and hands the findings over so the evaluator stays free
/// of adapter lookups.
#[derive(Debug, Clone, Default)]
pub struct AdapterFacts {
    /// JSON pointer of the first failing schema location, if any.
    pub schema_violation: Option<String>,
    /// The adapter is classified destructive.
    pub destructive: bool,
}

/// Bounded upper estimate of what the step under evaluation may consume.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepEstimate {
    pub tokens: u64,
    pub cost_usd: f64,
    pub wall_ms: u64,
}

/// Result of one evaluation: decision, machine-readable reasons, and the
/// approval rule that fired (for rendezvous parameters).
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub decision: Decision,
    pub reasons: Vec<String>,
    pub approval_rule: Option<ApprovalRule>,
}

impl Verdict {
    pub fn allow() -> Self {
        Self { decision: Decision::Allow, reasons: Vec::new(), approval_rule: None }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self { decision: Decision::Block, reasons: vec![reason.into()], approval_rule: None }
    }
}

/// Evaluate the decision procedure of the active policy snapshot.
///
/// Order: allowlist, argument schema, preconditions, budgets, approval
/// rules. Every firing appends a reason; the strictest class wins.
#[allow(clippy::too_many_arguments)]
pub fn evaluate(
    policy: &PolicyDoc,
    roles: &[String],
    tool: &str,
    args: &Value,
    context: &Value,
    totals: &RunMetrics,
    estimate: &StepEstimate,
    facts: &AdapterFacts,
    default_action: DefaultAction,
) -> Verdict {
    let mut decision = Decision::Allow;
    let mut reasons: Vec<String> = Vec::new();
    let mut approval_rule = None;

    // 1. allowlist
    if !policy.tool_allowed(roles, tool) {
        let unknown_everywhere = !policy.tool_known(tool);
        if unknown_everywhere && default_action == DefaultAction::Allow {
            reasons.push("default_action:allow".into());
        } else {
            decision = decision.strictest(Decision::Block);
            reasons.push("tool_not_allowed".into());
        }
    }

    // 2. argument schema
    if let Some(pointer) = &facts.schema_violation {
        decision = decision.strictest(Decision::Block);
        reasons.push(format!("schema_violation:{pointer}"));
    }

    // 3. preconditions
    for precondition in &policy.preconditions {
        if !precondition.holds(context, args) {
            decision = decision.strictest(Decision::Block);
            reasons.push(format!("precondition_failed:{}", precondition.name));
        }
    }

    // 4. budgets
    let budgets = &policy.budgets;
    if let Some(cap) = budgets.max_tokens_per_run {
        if totals.total_tokens() + estimate.tokens > cap {
            decision = decision.strictest(Decision::Block);
            reasons.push("budget_exceeded:max_tokens_per_run".into());
        }
    }
    if let Some(cap) = budgets.max_cost_per_run_usd {
        if totals.cost_usd + estimate.cost_usd > cap {
            decision = decision.strictest(Decision::Block);
            reasons.push("budget_exceeded:max_cost_per_run_usd".into());
        }
    }
    if let Some(cap) = budgets.max_wall_ms_per_run {
        if totals.wall_ms + estimate.wall_ms > cap {
            decision = decision.strictest(Decision::Block);
            reasons.push("budget_exceeded:max_wall_ms_per_run".into());
        }
    }

    // 5. approval rules and destructive classification
    if facts.destructive {
        decision = decision.strictest(Decision::RequireApproval);
        reasons.push("destructive_classification".into());
    }
    if let Some(rule) = policy.approval_rule_for(tool) {
        decision = decision.strictest(Decision::RequireApproval);
        reasons.push(format!("approval_rule:{}", rule.tool));
        approval_rule = Some(rule.clone());
    }

    if decision == Decision::Block {
        // approvals never soften a block
        approval_rule = None;
    }

    tracing::debug!(tool, %decision, reasons = ?reasons, "policy evaluated");
    Verdict { decision, reasons, approval_rule }
}

#[cfg(test)]
#[path = "evaluator_tests.rs"]
mod tests;
