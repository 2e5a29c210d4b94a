// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic stub mode for every role.

use crate::roles::{
    AgentError, PlannedStep, Planner, Review, ReviewRequest, Reviewer, ToolCall, Toolcaller,
};
use fm_core::Usage;
use fm_policy::evaluate;
use fm_runbook::{RunbookDoc, StepTemplate};
use serde_json::Value;

/// Reads explicit `tool` + `args` pairs from the document verbatim.
/// Prompt-only steps pass through without a tool for the toolcaller.
#[derive(Default)]
pub struct StubPlanner;

#[async_trait::async_trait]
impl Planner for StubPlanner {
    async fn plan(
        &self,
        runbook: &RunbookDoc,
        _context: &Value,
        _catalog: &[String],
    ) -> Result<(Vec<PlannedStep>, Usage), AgentError> {
        let planned = runbook
            .steps
            .iter()
            .map(|step| PlannedStep {
                name: step.name.clone(),
                tool: step.tool.clone(),
                args: step.args_or_empty(),
            })
            .collect();
        Ok((planned, Usage::default()))
    }
}

/// Passes the template through unchanged. Steps that reach the stub
/// without a concrete tool cannot be refined deterministically.
#[derive(Default)]
pub struct StubToolcaller;

#[async_trait::async_trait]
impl Toolcaller for StubToolcaller {
    async fn call(
        &self,
        step: &StepTemplate,
        context: &Value,
        _catalog: &[String],
    ) -> Result<(ToolCall, Usage), AgentError> {
        let Some(tool) = &step.tool else {
            return Err(AgentError::Malformed(format!(
                "step {:?} has only a prompt; stub toolcaller cannot refine it",
                step.name
            )));
        };
        let args = match step.args.clone() {
            Some(args) => args,
            None => context
                .get("default_args")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
        };
        let call = ToolCall {
            tool: tool.clone(),
            args,
            confidence: 0.9,
            rationale: format!("stub: using {tool} for {}", step.name),
        };
        Ok((call, Usage::default()))
    }
}

/// Delegates to the policy evaluator verbatim.
#[derive(Default)]
pub struct StubReviewer;

#[async_trait::async_trait]
impl Reviewer for StubReviewer {
    async fn review(&self, request: &ReviewRequest<'_>) -> Result<(Review, Usage), AgentError> {
        let verdict = evaluate(
            request.policy,
            &request.subject.roles,
            request.tool,
            request.args,
            request.context,
            request.totals,
            request.estimate,
            request.facts,
            request.default_action,
        );
        Ok((Review { verdict, disagreement: None }, Usage::default()))
    }
}

#[cfg(test)]
#[path = "stub_tests.rs"]
mod tests;
