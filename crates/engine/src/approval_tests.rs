// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_core::{ActorKind, FakeClock, Run, RunConfig, RunMode};
use fm_policy::ApprovalRule;
use fm_store::MemoryRunStore;

struct Harness {
    service: Arc<ApprovalService<FakeClock>>,
    store: Arc<MemoryRunStore>,
    audit: Arc<AuditLog>,
    clock: FakeClock,
    run: Run,
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryRunStore::new());
    let audit = Arc::new(AuditLog::new("salt"));
    let clock = FakeClock::new();
    let service = Arc::new(ApprovalService::new(
        store.clone() as Arc<dyn RunStore>,
        Arc::clone(&audit),
        clock.clone(),
        "salt",
    ));
    let caller = Subject::new("acme", "op@acme", ActorKind::User).with_roles(vec!["Admin".into()]);
    let run = Run::new(RunConfig::new("rb", RunMode::Execute, caller), clock.epoch_ms());
    store.create_run(run.clone()).await.unwrap();
    Harness { service, store, audit, clock, run }
}

fn rule(expiry_seconds: u64) -> ApprovalRule {
    ApprovalRule {
        tool: "cluster.drain_node".into(),
        requires_roles: vec!["Admin".into()],
        quorum: 1,
        expiry_seconds,
        allow_self: false,
    }
}

fn lead() -> Subject {
    Subject::new("acme", "lead@acme", ActorKind::User).with_roles(vec!["Admin".into()])
}

#[tokio::test]
async fn request_creates_pending_with_signed_token() {
    let h = harness().await;
    let approval = h.service.request(&h.run, 0, "destructive".into(), Some(&rule(600))).await.unwrap();
    assert_eq!(approval.state, ApprovalState::Pending);
    assert_eq!(approval.expiry_at_ms, h.clock.epoch_ms() + 600_000);
    let token = approval.token.unwrap();
    assert_eq!(token.sig.len(), 64);
    assert!(!token.nonce.is_empty());

    let events = h.audit.events("acme");
    assert_eq!(events.last().unwrap().action, "approval.requested");
}

#[tokio::test]
async fn request_reuses_pending_approval() {
    // at most one non-terminal approval per (run, step)
    let h = harness().await;
    let first = h.service.request(&h.run, 0, "r".into(), None).await.unwrap();
    let second = h.service.request(&h.run, 0, "r".into(), None).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(h.store.list_approvals(&h.run.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn approve_then_wait_returns_approved() {
    let h = harness().await;
    let approval = h.service.request(&h.run, 0, "r".into(), Some(&rule(600))).await.unwrap();
    h.service.decide(&approval.id, &lead(), true, Some("go".into())).await.unwrap();
    let state = h.service.wait(&approval.id, "acme").await.unwrap();
    assert_eq!(state, ApprovalState::Approved);
}

#[tokio::test]
async fn wait_unblocks_on_concurrent_decision() {
    let h = harness().await;
    let approval = h.service.request(&h.run, 0, "r".into(), Some(&rule(600))).await.unwrap();

    let waiter = {
        let service = Arc::clone(&h.service);
        let id = approval.id;
        tokio::spawn(async move { service.wait(&id, "acme").await })
    };
    tokio::task::yield_now().await;
    h.service.decide(&approval.id, &lead(), false, None).await.unwrap();
    let state = waiter.await.unwrap().unwrap();
    assert_eq!(state, ApprovalState::Denied);
}

#[tokio::test]
async fn four_eyes_rejects_self_decision() {
    let h = harness().await;
    let approval = h.service.request(&h.run, 0, "r".into(), Some(&rule(600))).await.unwrap();
    let requester =
        Subject::new("acme", "op@acme", ActorKind::User).with_roles(vec!["Admin".into()]);
    let err = h.service.decide(&approval.id, &requester, true, None).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn allow_self_rule_disables_four_eyes() {
    let h = harness().await;
    let mut self_rule = rule(600);
    self_rule.allow_self = true;
    let approval = h.service.request(&h.run, 0, "r".into(), Some(&self_rule)).await.unwrap();
    let requester =
        Subject::new("acme", "op@acme", ActorKind::User).with_roles(vec!["Admin".into()]);
    let decided = h.service.decide(&approval.id, &requester, true, None).await.unwrap();
    assert_eq!(decided.state, ApprovalState::Approved);
}

#[tokio::test]
async fn decider_must_hold_required_role() {
    let h = harness().await;
    let approval = h.service.request(&h.run, 0, "r".into(), Some(&rule(600))).await.unwrap();
    let viewer =
        Subject::new("acme", "viewer@acme", ActorKind::User).with_roles(vec!["Viewer".into()]);
    let err = h.service.decide(&approval.id, &viewer, true, None).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn second_decision_conflicts() {
    let h = harness().await;
    let approval = h.service.request(&h.run, 0, "r".into(), Some(&rule(600))).await.unwrap();
    h.service.decide(&approval.id, &lead(), true, None).await.unwrap();
    let err = h.service.decide(&approval.id, &lead(), false, None).await.unwrap_err();
    assert!(matches!(err, EngineError::Concurrency(_)));
}

#[tokio::test]
async fn expiry_at_deadline_reads_as_denied() {
    let h = harness().await;
    let approval = h.service.request(&h.run, 0, "r".into(), Some(&rule(600))).await.unwrap();
    // exactly at the deadline
    h.clock.advance_ms(600_000);
    let state = h.service.wait(&approval.id, "acme").await.unwrap();
    assert_eq!(state, ApprovalState::Expired);
    assert!(!state.permits_invocation());

    let stored = h.store.load_approval(&approval.id).await.unwrap().unwrap();
    assert_eq!(stored.state, ApprovalState::Expired);
    assert_eq!(h.audit.events("acme").last().unwrap().action, "approval.expired");
}

#[tokio::test]
async fn decide_after_expiry_expires_and_errors() {
    let h = harness().await;
    let approval = h.service.request(&h.run, 0, "r".into(), Some(&rule(600))).await.unwrap();
    h.clock.advance_ms(700_000);
    let err = h.service.decide(&approval.id, &lead(), true, None).await.unwrap_err();
    assert!(matches!(err, EngineError::Policy(_)));
    let stored = h.store.load_approval(&approval.id).await.unwrap().unwrap();
    assert_eq!(stored.state, ApprovalState::Expired);
}

#[tokio::test]
async fn audit_chain_verifies_after_decisions() {
    let h = harness().await;
    let approval = h.service.request(&h.run, 0, "r".into(), Some(&rule(600))).await.unwrap();
    h.service.decide(&approval.id, &lead(), true, None).await.unwrap();
    h.audit.verify("acme").unwrap();
}
