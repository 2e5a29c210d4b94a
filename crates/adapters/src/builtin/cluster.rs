// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster controller mock: cordon/uncordon/drain nodes and restart
//! deployments. Cordon and uncordon are declared as mutual inverses;
//! drain is destructive and compensated by uncordon.

use crate::contract::{
    Adapter, AdapterError, AdapterSpec, Classification, Invocation, InvokeCtx,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Shared in-memory node state.
#[derive(Default)]
pub struct ClusterState {
    cordoned: Mutex<HashSet<String>>,
    restarts: Mutex<Vec<String>>,
}

impl ClusterState {
    pub fn is_cordoned(&self, node: &str) -> bool {
        self.cordoned.lock().contains(node)
    }

    pub fn restart_count(&self) -> usize {
        self.restarts.lock().len()
    }
}

fn node_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "node": {"type": "string", "minLength": 1},
        },
        "required": ["node"],
        "additionalProperties": false,
    })
}

/// One cluster tool bound to the shared state.
pub struct ClusterAdapter {
    spec: AdapterSpec,
    state: Arc<ClusterState>,
}

impl ClusterAdapter {
    pub fn all() -> Vec<Arc<dyn Adapter>> {
        Self::all_with_state(Arc::new(ClusterState::default()))
    }

    pub fn all_with_state(state: Arc<ClusterState>) -> Vec<Arc<dyn Adapter>> {
        let cordon = AdapterSpec::new("cluster.cordon_node", node_schema(), Classification::Write)
            .idempotent()
            .compensated_by("cluster.uncordon_node");
        let uncordon =
            AdapterSpec::new("cluster.uncordon_node", node_schema(), Classification::Write)
                .idempotent()
                .compensated_by("cluster.cordon_node");
        let drain = AdapterSpec::new(
            "cluster.drain_node",
            json!({
                "type": "object",
                "properties": {
                    "node": {"type": "string", "minLength": 1},
                    "evict": {"type": "boolean"},
                    "force": {"type": "boolean"},
                },
                "required": ["node"],
                "additionalProperties": false,
            }),
            Classification::Destructive,
        )
        .compensated_by("cluster.uncordon_node")
        .timeout_ms(120_000);
        let restart = AdapterSpec::new(
            "cluster.restart_deployment",
            json!({
                "type": "object",
                "properties": {
                    "deployment": {"type": "string", "minLength": 1},
                    "namespace": {"type": "string", "minLength": 1},
                },
                "required": ["deployment", "namespace"],
                "additionalProperties": false,
            }),
            Classification::Write,
        );

        [cordon, uncordon, drain, restart]
            .into_iter()
            .map(|spec| {
                Arc::new(Self { spec, state: Arc::clone(&state) }) as Arc<dyn Adapter>
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Adapter for ClusterAdapter {
    fn spec(&self) -> &AdapterSpec {
        &self.spec
    }

    async fn invoke(&self, args: &Value, _ctx: &InvokeCtx) -> Result<Invocation, AdapterError> {
        match self.spec.id.as_str() {
            "cluster.cordon_node" => {
                let node = args["node"].as_str().unwrap_or_default();
                self.state.cordoned.lock().insert(node.to_string());
                Ok(Invocation::new(json!({"ok": true, "simulated": true, "node": node, "cordoned": true})))
            }
            "cluster.uncordon_node" => {
                let node = args["node"].as_str().unwrap_or_default();
                self.state.cordoned.lock().remove(node);
                Ok(Invocation::new(json!({"ok": true, "simulated": true, "node": node, "cordoned": false})))
            }
            "cluster.drain_node" => {
                let node = args["node"].as_str().unwrap_or_default();
                self.state.cordoned.lock().insert(node.to_string());
                let evict = args.get("evict").and_then(Value::as_bool).unwrap_or(true);
                Ok(Invocation::new(json!({
                    "ok": true,
                    "simulated": true,
                    "node": node,
                    "evicted": evict,
                })))
            }
            "cluster.restart_deployment" => {
                let deployment = args["deployment"].as_str().unwrap_or_default();
                let namespace = args["namespace"].as_str().unwrap_or_default();
                self.state.restarts.lock().push(format!("{namespace}/{deployment}"));
                Ok(Invocation::new(json!({
                    "ok": true,
                    "simulated": true,
                    "deployment": deployment,
                    "namespace": namespace,
                    "restarted_at_generation": self.state.restarts.lock().len(),
                })))
            }
            other => Err(AdapterError::permanent(format!("unknown cluster tool {other}"))),
        }
    }
}
