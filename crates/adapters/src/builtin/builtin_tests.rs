// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::contract::{AdapterErrorKind, Classification, InvokeCtx};
use serde_json::json;

fn ctx() -> InvokeCtx {
    InvokeCtx { tenant: "acme".into(), run_id: "run-1".into(), idempotency_key: None }
}

#[tokio::test]
async fn standard_registry_has_all_tools() {
    let registry = standard_registry();
    for tool in [
        "tracker.create_issue",
        "tracker.comment_issue",
        "tracker.close_issue",
        "cluster.cordon_node",
        "cluster.uncordon_node",
        "cluster.drain_node",
        "cluster.restart_deployment",
        "pager.create_incident",
        "pager.resolve_incident",
    ] {
        assert!(registry.contains(tool), "missing {tool}");
    }
}

#[tokio::test]
async fn create_issue_assigns_numbers() {
    let registry = standard_registry();
    let first = registry
        .invoke("tracker.create_issue", &json!({"title": "a"}), &ctx())
        .await
        .unwrap();
    let second = registry
        .invoke("tracker.create_issue", &json!({"title": "b"}), &ctx())
        .await
        .unwrap();
    assert_eq!(first.output["issue"], 1);
    assert_eq!(second.output["issue"], 2);
    assert_eq!(second.output["simulated"], true);
}

#[tokio::test]
async fn close_issue_compensates_create() {
    let registry = standard_registry();
    let spec_compensation = registry.get("tracker.create_issue").unwrap().spec().compensation.clone();
    assert_eq!(spec_compensation.as_deref(), Some("tracker.close_issue"));

    registry.invoke("tracker.create_issue", &json!({"title": "a"}), &ctx()).await.unwrap();
    let closed =
        registry.invoke("tracker.close_issue", &json!({"issue": 1}), &ctx()).await.unwrap();
    assert_eq!(closed.output["ok"], true);
}

#[tokio::test]
async fn comment_unknown_issue_is_permanent() {
    let registry = standard_registry();
    let err = registry
        .invoke("tracker.comment_issue", &json!({"issue": 9, "body": "hi"}), &ctx())
        .await
        .unwrap_err();
    assert_eq!(err.kind, AdapterErrorKind::Permanent);
}

#[tokio::test]
async fn cordon_uncordon_round_trip() {
    let state = std::sync::Arc::new(cluster::ClusterState::default());
    let mut registry = crate::registry::AdapterRegistry::new();
    for adapter in ClusterAdapter::all_with_state(std::sync::Arc::clone(&state)) {
        registry.register(adapter);
    }

    registry.invoke("cluster.cordon_node", &json!({"node": "w1"}), &ctx()).await.unwrap();
    assert!(state.is_cordoned("w1"));
    registry.invoke("cluster.uncordon_node", &json!({"node": "w1"}), &ctx()).await.unwrap();
    assert!(!state.is_cordoned("w1"));
}

#[tokio::test]
async fn drain_is_destructive_with_compensation() {
    let registry = standard_registry();
    let adapter = registry.get("cluster.drain_node").unwrap();
    assert_eq!(adapter.spec().classification, Classification::Destructive);
    assert_eq!(adapter.spec().compensation.as_deref(), Some("cluster.uncordon_node"));
}

#[tokio::test]
async fn drain_schema_rejects_extra_args() {
    let registry = standard_registry();
    let err = registry
        .invoke("cluster.drain_node", &json!({"node": "w1", "grace": 30}), &ctx())
        .await
        .unwrap_err();
    assert_eq!(err.kind, AdapterErrorKind::ValidationFailed);
}

#[tokio::test]
async fn pager_routing_key_is_schema_secret() {
    let registry = standard_registry();
    let adapter = registry.get("pager.create_incident").unwrap();
    assert_eq!(crate::schema::secret_keys(&adapter.spec().schema), vec!["routing_key".to_string()]);
}

#[tokio::test]
async fn resolve_incident_round_trip() {
    let registry = standard_registry();
    registry
        .invoke("pager.create_incident", &json!({"summary": "s", "severity": "high"}), &ctx())
        .await
        .unwrap();
    let resolved = registry
        .invoke("pager.resolve_incident", &json!({"incident": 1}), &ctx())
        .await
        .unwrap();
    assert_eq!(resolved.output["incident"], 1);
}
