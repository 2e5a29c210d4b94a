// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Paging mock: `pager.create_incident`, `pager.resolve_incident`.

use crate::contract::{
    Adapter, AdapterError, AdapterSpec, Classification, Invocation, InvokeCtx,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Default)]
pub struct PagerState {
    incidents: Mutex<Vec<bool>>, // true = open
}

/// One pager tool bound to the shared state.
pub struct PagerAdapter {
    spec: AdapterSpec,
    state: Arc<PagerState>,
}

impl PagerAdapter {
    pub fn all() -> Vec<Arc<dyn Adapter>> {
        let state = Arc::new(PagerState::default());
        let create = AdapterSpec::new(
            "pager.create_incident",
            json!({
                "type": "object",
                "properties": {
                    "summary": {"type": "string", "minLength": 1},
                    "severity": {"type": "string", "enum": ["low", "high", "critical"]},
                    "routing_key": {"type": "string", "secret": true},
                },
                "required": ["summary"],
                "additionalProperties": false,
            }),
            Classification::Write,
        )
        .compensated_by("pager.resolve_incident");
        let resolve = AdapterSpec::new(
            "pager.resolve_incident",
            json!({
                "type": "object",
                "properties": {
                    "incident": {"type": "integer", "minimum": 1},
                },
                "required": ["incident"],
                "additionalProperties": false,
            }),
            Classification::Write,
        )
        .idempotent();

        vec![
            Arc::new(Self { spec: create, state: Arc::clone(&state) }),
            Arc::new(Self { spec: resolve, state }),
        ]
    }
}

#[async_trait::async_trait]
impl Adapter for PagerAdapter {
    fn spec(&self) -> &AdapterSpec {
        &self.spec
    }

    async fn invoke(&self, args: &Value, _ctx: &InvokeCtx) -> Result<Invocation, AdapterError> {
        match self.spec.id.as_str() {
            "pager.create_incident" => {
                let mut incidents = self.state.incidents.lock();
                incidents.push(true);
                Ok(Invocation::new(json!({
                    "ok": true,
                    "simulated": true,
                    "incident": incidents.len(),
                })))
            }
            "pager.resolve_incident" => {
                let number = args["incident"].as_u64().unwrap_or(0) as usize;
                let mut incidents = self.state.incidents.lock();
                match incidents.get_mut(number.wrapping_sub(1)) {
                    Some(open) => {
                        *open = false;
                        Ok(Invocation::new(json!({"ok": true, "simulated": true, "incident": number})))
                    }
                    None => Err(AdapterError::permanent(format!("incident {number} not found"))),
                }
            }
            other => Err(AdapterError::permanent(format!("unknown pager tool {other}"))),
        }
    }
}
