// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_core::{RunEvent, RunMode, RunStatus, Step, StepStatus};
use serde_json::json;

fn run() -> Run {
    Run::builder().build()
}

#[tokio::test]
async fn create_and_load_run() {
    let store = MemoryRunStore::new();
    let run = run();
    let id = run.id;
    store.create_run(run).await.unwrap();
    let loaded = store.load_run(&id).await.unwrap().unwrap();
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.status, RunStatus::Pending);
}

#[tokio::test]
async fn duplicate_run_id_rejected() {
    let store = MemoryRunStore::new();
    let run = run();
    store.create_run(run.clone()).await.unwrap();
    assert!(matches!(store.create_run(run).await, Err(StoreError::Duplicate(_))));
}

#[tokio::test]
async fn idempotency_key_resolves_existing_run() {
    let store = MemoryRunStore::new();
    let mut run = run();
    run.idempotency_key = Some("submit-1".into());
    let id = run.id;
    store.create_run(run).await.unwrap();

    let found = store.find_run_by_idempotency_key("acme", "submit-1").await.unwrap();
    assert_eq!(found, Some(id));
    assert!(store.find_run_by_idempotency_key("acme", "other").await.unwrap().is_none());
    assert!(store.find_run_by_idempotency_key("globex", "submit-1").await.unwrap().is_none());
}

#[tokio::test]
async fn save_step_upserts_by_index() {
    let store = MemoryRunStore::new();
    let run = run();
    let run_id = run.id;
    store.create_run(run).await.unwrap();

    let mut step = Step::pending(run_id, 0, "a", "x.y", json!({}));
    store.save_step(&step).await.unwrap();
    step.start(10);
    step.finish(StepStatus::Succeeded, 20);
    store.save_step(&step).await.unwrap();

    let steps = store.list_steps(&run_id).await.unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].status, StepStatus::Succeeded);
}

#[tokio::test]
async fn steps_listed_in_index_order() {
    let store = MemoryRunStore::new();
    let run_id = run().id;
    for index in [2u32, 0, 1] {
        store
            .save_step(&Step::pending(run_id, index, format!("s{index}"), "x.y", json!({})))
            .await
            .unwrap();
    }
    let steps = store.list_steps(&run_id).await.unwrap();
    let indexes: Vec<u32> = steps.iter().map(|s| s.index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);
}

#[tokio::test]
async fn event_cursor_restarts() {
    let store = MemoryRunStore::new();
    let run_id = run().id;
    for i in 0..3 {
        store
            .publish_event(RunEvent::StepStarted {
                run_id,
                index: i,
                name: format!("s{i}"),
                tool: "x.y".into(),
            })
            .await
            .unwrap();
    }

    let (cursor, events) = store.events_since(&run_id, 0).await.unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(cursor, 3);

    // restart from the saved cursor picks up only the new tail
    store
        .publish_event(RunEvent::RunTerminated { run_id, status: RunStatus::Succeeded })
        .await
        .unwrap();
    let (cursor, tail) = store.events_since(&run_id, cursor).await.unwrap();
    assert_eq!(cursor, 4);
    assert_eq!(tail.len(), 1);
    assert!(tail[0].is_terminal());
}

#[tokio::test]
async fn subscribe_receives_live_events() {
    let store = MemoryRunStore::new();
    let run_id = run().id;
    let mut rx = store.subscribe(&run_id);
    store
        .publish_event(RunEvent::RunStarted { run_id, mode: RunMode::Execute })
        .await
        .unwrap();
    let event = rx.recv().await.unwrap();
    assert_eq!(event.run_id(), run_id);
}

#[tokio::test]
async fn lease_excludes_second_owner() {
    let store = MemoryRunStore::new();
    let run_id = run().id;
    let lease = store.acquire_lease(&run_id, "exec-1", 30_000, 1_000).await.unwrap();
    let err = store.acquire_lease(&run_id, "exec-2", 30_000, 2_000).await.unwrap_err();
    assert!(matches!(err, StoreError::LeaseHeld { .. }));

    store.release_lease(&lease).await.unwrap();
    store.acquire_lease(&run_id, "exec-2", 30_000, 3_000).await.unwrap();
}

#[tokio::test]
async fn expired_lease_can_be_taken_over() {
    let store = MemoryRunStore::new();
    let run_id = run().id;
    let stale = store.acquire_lease(&run_id, "exec-1", 1_000, 1_000).await.unwrap();
    // past expiry, a new owner wins
    let fresh = store.acquire_lease(&run_id, "exec-2", 30_000, 5_000).await.unwrap();
    assert_eq!(fresh.owner, "exec-2");

    // the fenced-out owner cannot renew
    assert!(matches!(store.renew_lease(&stale, 6_000).await, Err(StoreError::LeaseLost)));
}

#[tokio::test]
async fn renew_extends_held_lease() {
    let store = MemoryRunStore::new();
    let run_id = run().id;
    let lease = store.acquire_lease(&run_id, "exec-1", 30_000, 1_000).await.unwrap();
    let renewed = store.renew_lease(&lease, 10_000).await.unwrap();
    assert!(renewed.expires_at_ms > lease.expires_at_ms);
}

#[tokio::test]
async fn approvals_listed_in_creation_order() {
    let store = MemoryRunStore::new();
    let run_id = run().id;
    for i in 0..3u32 {
        let approval = fm_core::Approval {
            id: fm_core::ApprovalId::new(),
            run_id,
            step_index: i,
            requested_by: "op@acme".into(),
            reason: "r".into(),
            state: fm_core::ApprovalState::Pending,
            required_roles: vec![],
            allow_self: false,
            decider: None,
            decided_at_ms: None,
            comment: None,
            created_at_ms: i as u64,
            expiry_at_ms: 100,
            token: None,
        };
        store.save_approval(&approval).await.unwrap();
    }
    let approvals = store.list_approvals(&run_id).await.unwrap();
    assert_eq!(approvals.len(), 3);
    assert_eq!(approvals[0].step_index, 0);
    assert_eq!(approvals[2].step_index, 2);
}
