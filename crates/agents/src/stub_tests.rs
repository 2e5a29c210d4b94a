// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_core::{ActorKind, RunMetrics, Subject};
use fm_policy::{AdapterFacts, Decision, DefaultAction, PolicyDoc, StepEstimate};
use fm_runbook::{Format, RunbookDoc};
use serde_json::json;

fn runbook() -> RunbookDoc {
    RunbookDoc::parse(
        r#"
name: restart-web
steps:
  - name: file-ticket
    tool: tracker.create_issue
    args: {title: X, body: Y}
  - name: verify
    prompt: check replicas
"#,
        Format::Yaml,
    )
    .unwrap()
}

#[tokio::test]
async fn stub_planner_reads_pairs_verbatim() {
    let (planned, usage) = StubPlanner.plan(&runbook(), &json!({}), &[]).await.unwrap();
    assert_eq!(planned.len(), 2);
    assert_eq!(planned[0].tool.as_deref(), Some("tracker.create_issue"));
    assert_eq!(planned[0].args["title"], "X");
    assert!(planned[1].tool.is_none());
    assert_eq!(usage, fm_core::Usage::default());
}

#[tokio::test]
async fn stub_toolcaller_passes_through() {
    let rb = runbook();
    let (call, _) = StubToolcaller.call(&rb.steps[0], &json!({}), &[]).await.unwrap();
    assert_eq!(call.tool, "tracker.create_issue");
    assert_eq!(call.args["body"], "Y");
    assert!(call.confidence > 0.8);
}

#[tokio::test]
async fn stub_toolcaller_uses_context_default_args() {
    let rb = RunbookDoc::parse(
        "name: rb\nsteps:\n  - {name: a, tool: x.y}\n",
        Format::Yaml,
    )
    .unwrap();
    let context = json!({"default_args": {"namespace": "prod"}});
    let (call, _) = StubToolcaller.call(&rb.steps[0], &context, &[]).await.unwrap();
    assert_eq!(call.args["namespace"], "prod");
}

#[tokio::test]
async fn stub_toolcaller_rejects_prompt_only_steps() {
    let rb = runbook();
    let err = StubToolcaller.call(&rb.steps[1], &json!({}), &[]).await.unwrap_err();
    assert!(matches!(err, AgentError::Malformed(_)));
}

#[tokio::test]
async fn stub_reviewer_delegates_to_evaluator() {
    let policy = PolicyDoc::from_yaml(
        "name: p\nversion: \"1\"\ntool_allowlist:\n  Admin: [\"tracker.*\"]\n",
    )
    .unwrap();
    let subject =
        Subject::new("acme", "op@acme", ActorKind::User).with_roles(vec!["Admin".into()]);
    let args = json!({"title": "X"});
    let context = json!({});
    let totals = RunMetrics::default();
    let estimate = StepEstimate::default();
    let facts = AdapterFacts::default();

    let request = ReviewRequest {
        tool: "tracker.create_issue",
        args: &args,
        subject: &subject,
        policy: &policy,
        context: &context,
        totals: &totals,
        estimate: &estimate,
        facts: &facts,
        default_action: DefaultAction::Block,
    };
    let (review, _) = StubReviewer.review(&request).await.unwrap();
    assert_eq!(review.verdict.decision, Decision::Allow);
    assert!(review.disagreement.is_none());

    let request = ReviewRequest { tool: "cluster.drain_node", ..request };
    let (review, _) = StubReviewer.review(&request).await.unwrap();
    assert_eq!(review.verdict.decision, Decision::Block);
    assert_eq!(review.verdict.reasons, vec!["tool_not_allowed"]);
}
