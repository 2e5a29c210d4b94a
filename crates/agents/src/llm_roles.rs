// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM mode for every role.

use crate::llm::{llm_json, LlmClient};
use crate::roles::{
    AgentError, Disagreement, PlannedStep, Planner, Review, ReviewRequest, Reviewer, ToolCall,
    Toolcaller,
};
use crate::schemas::{PLANNER_OUT, REVIEWER_OUT, TOOLCALLER_OUT};
use crate::MAX_AGENT_ATTEMPTS;
use fm_core::Usage;
use fm_policy::{evaluate, Decision, Verdict};
use fm_runbook::{RunbookDoc, StepTemplate};
use serde_json::Value;
use std::sync::Arc;

const PLANNER_SYSTEM: &str = "You plan operational runbooks. Given a runbook document, a run \
context, and a tool catalog, emit the ordered step list as JSON: \
{\"steps\":[{\"name\":...,\"tool\":...,\"args\":{...}}]}. Use only tools from the catalog. \
Output JSON only.";

const TOOLCALLER_SYSTEM: &str = "You turn one runbook step into a concrete tool call. Emit JSON: \
{\"tool\":...,\"args\":{...},\"confidence\":0..1,\"rationale\":...}. Use only tools from the \
catalog. Output JSON only.";

const REVIEWER_SYSTEM: &str = "You review one tool call against a policy document. Emit JSON: \
{\"decision\":\"allow\"|\"block\"|\"require_approval\",\"reasons\":[...]}. Output JSON only.";

/// Planner over an LLM with schema-validated output.
pub struct LlmPlanner {
    client: Arc<dyn LlmClient>,
    max_attempts: u32,
}

impl LlmPlanner {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client, max_attempts: MAX_AGENT_ATTEMPTS }
    }
}

#[async_trait::async_trait]
impl Planner for LlmPlanner {
    async fn plan(
        &self,
        runbook: &RunbookDoc,
        context: &Value,
        catalog: &[String],
    ) -> Result<(Vec<PlannedStep>, Usage), AgentError> {
        let user = format!(
            "Runbook:\n{}\n\nContext:\n{}\n\nTool catalog: {}",
            serde_json::to_string_pretty(runbook).unwrap_or_default(),
            serde_json::to_string_pretty(context).unwrap_or_default(),
            catalog.join(", "),
        );
        let (value, usage) = llm_json(
            self.client.as_ref(),
            "planner",
            PLANNER_SYSTEM,
            &user,
            &PLANNER_OUT,
            self.max_attempts,
        )
        .await?;

        let steps = value["steps"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| PlannedStep {
                        name: item["name"].as_str().unwrap_or_default().to_string(),
                        tool: item["tool"].as_str().map(str::to_string),
                        args: item["args"].clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok((steps, usage))
    }
}

/// Toolcaller over an LLM with schema-validated output.
pub struct LlmToolcaller {
    client: Arc<dyn LlmClient>,
    max_attempts: u32,
}

impl LlmToolcaller {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client, max_attempts: MAX_AGENT_ATTEMPTS }
    }
}

#[async_trait::async_trait]
impl Toolcaller for LlmToolcaller {
    async fn call(
        &self,
        step: &StepTemplate,
        context: &Value,
        catalog: &[String],
    ) -> Result<(ToolCall, Usage), AgentError> {
        let user = format!(
            "Step: {}\nTool hint: {}\nPrompt: {}\nContext: {}\nTool catalog: {}",
            step.name,
            step.tool.as_deref().unwrap_or("(none)"),
            step.prompt.as_deref().unwrap_or("(none)"),
            serde_json::to_string(context).unwrap_or_default(),
            catalog.join(", "),
        );
        let (value, usage) = llm_json(
            self.client.as_ref(),
            "toolcaller",
            TOOLCALLER_SYSTEM,
            &user,
            &TOOLCALLER_OUT,
            self.max_attempts,
        )
        .await?;

        let call = ToolCall {
            tool: value["tool"].as_str().unwrap_or_default().to_string(),
            args: value["args"].clone(),
            confidence: value["confidence"].as_f64().unwrap_or(0.0),
            rationale: value["rationale"].as_str().unwrap_or_default().to_string(),
        };
        Ok((call, usage))
    }
}

/// Reviewer over an LLM, intersected with the policy evaluator.
///
/// The two decisions are merged by strictness: the policy evaluator is a
/// floor the model can tighten but never loosen. Disagreements are
/// reported so the executor can audit them.
pub struct LlmReviewer {
    client: Arc<dyn LlmClient>,
    max_attempts: u32,
}

impl LlmReviewer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client, max_attempts: MAX_AGENT_ATTEMPTS }
    }
}

#[async_trait::async_trait]
impl Reviewer for LlmReviewer {
    async fn review(&self, request: &ReviewRequest<'_>) -> Result<(Review, Usage), AgentError> {
        let policy_verdict = evaluate(
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

        let user = format!(
            "Tool: {}\nArgs: {}\nPolicy: {}",
            request.tool,
            serde_json::to_string(request.args).unwrap_or_default(),
            serde_json::to_string(&request.policy).unwrap_or_default(),
        );
        let (value, usage) = llm_json(
            self.client.as_ref(),
            "reviewer",
            REVIEWER_SYSTEM,
            &user,
            &REVIEWER_OUT,
            self.max_attempts,
        )
        .await?;

        let llm_decision = match value["decision"].as_str() {
            Some("block") => Decision::Block,
            Some("require_approval") => Decision::RequireApproval,
            _ => Decision::Allow,
        };
        let llm_reasons: Vec<String> = value["reasons"]
            .as_array()
            .map(|items| {
                items.iter().filter_map(Value::as_str).map(str::to_string).collect()
            })
            .unwrap_or_default();

        let final_decision = policy_verdict.decision.strictest(llm_decision);
        let disagreement = (llm_decision != policy_verdict.decision).then_some(Disagreement {
            llm: llm_decision,
            policy: policy_verdict.decision,
        });

        let mut reasons = policy_verdict.reasons.clone();
        for reason in llm_reasons {
            reasons.push(format!("reviewer:{reason}"));
        }

        let verdict = Verdict {
            decision: final_decision,
            reasons,
            // rendezvous parameters only come from the policy side
            approval_rule: if final_decision == Decision::Block {
                None
            } else {
                policy_verdict.approval_rule
            },
        };
        Ok((Review { verdict, disagreement }, usage))
    }
}

#[cfg(test)]
#[path = "llm_roles_tests.rs"]
mod tests;
