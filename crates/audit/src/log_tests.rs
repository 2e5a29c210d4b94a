// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event::EventDraft;
use fm_core::ActorKind;
use serde_json::json;
use std::sync::Arc;

fn draft(action: &str) -> EventDraft {
    EventDraft::new("op@acme", ActorKind::User, action, "run", "run-1")
}

#[test]
fn append_assigns_dense_sequence() {
    let log = AuditLog::new("salt");
    let e1 = log.append("acme", draft("run.started"), 1_000).unwrap();
    let e2 = log.append("acme", draft("step.succeeded"), 2_000).unwrap();
    assert_eq!(e1.seq, 1);
    assert_eq!(e2.seq, 2);
    assert_eq!(e2.prev_hash, e1.this_hash);
}

#[test]
fn tenants_have_independent_chains() {
    let log = AuditLog::new("salt");
    log.append("acme", draft("run.started"), 1).unwrap();
    let globex = log.append("globex", draft("run.started"), 1).unwrap();
    assert_eq!(globex.seq, 1);
    assert_eq!(globex.prev_hash, crate::chain::GENESIS_HASH);
}

#[test]
fn timestamps_are_rfc3339_utc() {
    let log = AuditLog::new("salt");
    let event = log.append("acme", draft("run.started"), 1_700_000_000_000).unwrap();
    assert_eq!(event.ts, "2023-11-14T22:13:20.000Z");
}

#[test]
fn payload_redacted_before_hashing() {
    let log = AuditLog::new("salt");
    let event = log
        .append(
            "acme",
            draft("step.succeeded").payload(json!({"token": "super-secret", "ok": true})),
            1_000,
        )
        .unwrap();
    assert!(event.payload["token"].get("redacted").is_some());
    // the chain commits to the redacted payload, so it still verifies
    log.verify("acme").unwrap();
}

#[test]
fn whole_chain_verifies() {
    let log = AuditLog::new("salt");
    for i in 0..10 {
        log.append("acme", draft(&format!("step.{i}")), i).unwrap();
    }
    log.verify("acme").unwrap();
    log.verify_range("acme", 3, 7).unwrap();
}

#[test]
fn events_for_resource_filters() {
    let log = AuditLog::new("salt");
    log.append("acme", draft("run.started"), 1).unwrap();
    log.append(
        "acme",
        EventDraft::new("op@acme", ActorKind::User, "run.started", "run", "run-2"),
        2,
    )
    .unwrap();
    let events = log.events_for_resource("acme", "run-1");
    assert_eq!(events.len(), 1);
}

#[test]
fn concurrent_appends_stay_totally_ordered() {
    let log = Arc::new(AuditLog::new("salt"));
    let mut handles = Vec::new();
    for t in 0..8 {
        let log = Arc::clone(&log);
        handles.push(std::thread::spawn(move || {
            for i in 0..25 {
                log.append("acme", draft(&format!("worker.{t}.{i}")), i).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    let events = log.events("acme");
    assert_eq!(events.len(), 200);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.seq, i as u64 + 1);
    }
    log.verify("acme").unwrap();
}

#[test]
fn export_import_round_trip_preserves_verifiability() {
    let log = AuditLog::new("salt");
    for i in 0..5 {
        log.append("acme", draft(&format!("step.{i}")), i).unwrap();
    }
    let exported = log.export("acme");

    let other = AuditLog::new("salt");
    other.import("acme", exported).unwrap();
    other.verify("acme").unwrap();
    assert_eq!(other.len("acme"), 5);
}

#[test]
fn import_rejects_tampered_chain() {
    let log = AuditLog::new("salt");
    log.append("acme", draft("run.started"), 1).unwrap();
    let mut exported = log.export("acme");
    exported[0].actor = "intruder".into();

    let other = AuditLog::new("salt");
    assert!(other.import("acme", exported).is_err());
}

#[test]
fn import_rejects_non_genesis_start() {
    let log = AuditLog::new("salt");
    for i in 0..3 {
        log.append("acme", draft(&format!("step.{i}")), i).unwrap();
    }
    let tail: Vec<AuditEvent> =
        log.export("acme").into_iter().skip(1).collect();
    let other = AuditLog::new("salt");
    assert!(other.import("acme", tail).is_err());
}

#[test]
fn import_rejects_occupied_tenant() {
    let log = AuditLog::new("salt");
    log.append("acme", draft("run.started"), 1).unwrap();
    let exported = log.export("acme");
    assert!(log.import("acme", exported).is_err());
}
