// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Role contracts shared by stub and LLM modes.

use fm_core::{RunMetrics, Subject, Usage};
use fm_policy::{AdapterFacts, Decision, DefaultAction, PolicyDoc, StepEstimate, Verdict};
use fm_runbook::{RunbookDoc, StepTemplate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Agent-side failures. `Malformed` is raised only after the retry bound
/// is exhausted; it surfaces as a step failure with code `agent_malformed`.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent returned non-conforming output: {0}")]
    Malformed(String),
    #[error("llm transport error: {0}")]
    Transport(String),
}

/// One candidate step from the planner. `tool` is absent for steps the
/// toolcaller must still refine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default)]
    pub args: Value,
}

/// Runbook → ordered candidate step list.
#[async_trait::async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        runbook: &RunbookDoc,
        context: &Value,
        catalog: &[String],
    ) -> Result<(Vec<PlannedStep>, Usage), AgentError>;
}

/// Concrete tool selection for one pending step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub args: Value,
    pub confidence: f64,
    pub rationale: String,
}

/// Pending step (possibly missing or loose args) → concrete tool + args.
#[async_trait::async_trait]
pub trait Toolcaller: Send + Sync {
    async fn call(
        &self,
        step: &StepTemplate,
        context: &Value,
        catalog: &[String],
    ) -> Result<(ToolCall, Usage), AgentError>;
}

/// Everything a reviewer needs to judge one invocation.
pub struct ReviewRequest<'a> {
    pub tool: &'a str,
    pub args: &'a Value,
    pub subject: &'a Subject,
    pub policy: &'a PolicyDoc,
    pub context: &'a Value,
    pub totals: &'a RunMetrics,
    pub estimate: &'a StepEstimate,
    pub facts: &'a AdapterFacts,
    pub default_action: DefaultAction,
}

/// LLM-vs-policy split recorded when the two reviewers disagree.
/// The stricter decision always wins; the disagreement is audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disagreement {
    pub llm: Decision,
    pub policy: Decision,
}

/// Reviewer output. The verdict here is the only thing that authorizes an
/// adapter invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub verdict: Verdict,
    pub disagreement: Option<Disagreement>,
}

/// (tool, args) + subject + policy snapshot → decision with reasons.
#[async_trait::async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, request: &ReviewRequest<'_>) -> Result<(Review, Usage), AgentError>;
}
