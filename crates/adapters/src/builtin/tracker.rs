// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue tracker mock: `tracker.create_issue`, `tracker.comment_issue`,
//! `tracker.close_issue`.

use crate::contract::{
    Adapter, AdapterError, AdapterSpec, Classification, Invocation, InvokeCtx,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Issue {
    title: String,
    open: bool,
}

/// Shared in-memory issue store backing all three tools.
#[derive(Default)]
pub struct TrackerState {
    issues: Mutex<Vec<Issue>>,
}

impl TrackerState {
    pub fn issue_count(&self) -> usize {
        self.issues.lock().len()
    }

    pub fn open_count(&self) -> usize {
        self.issues.lock().iter().filter(|i| i.open).count()
    }
}

/// One tracker tool bound to the shared state.
pub struct TrackerAdapter {
    spec: AdapterSpec,
    state: Arc<TrackerState>,
}

impl TrackerAdapter {
    /// All tracker tools over one fresh shared state.
    pub fn all() -> Vec<Arc<dyn Adapter>> {
        let state = Arc::new(TrackerState::default());
        Self::all_with_state(state)
    }

    pub fn all_with_state(state: Arc<TrackerState>) -> Vec<Arc<dyn Adapter>> {
        vec![
            Arc::new(Self::create(Arc::clone(&state))),
            Arc::new(Self::comment(Arc::clone(&state))),
            Arc::new(Self::close(state)),
        ]
    }

    fn create(state: Arc<TrackerState>) -> Self {
        let schema = json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "minLength": 1},
                "body": {"type": "string"},
                "labels": {"type": "array", "items": {"type": "string"}},
            },
            "required": ["title"],
            "additionalProperties": false,
        });
        Self {
            spec: AdapterSpec::new("tracker.create_issue", schema, Classification::Write)
                .compensated_by("tracker.close_issue"),
            state,
        }
    }

    fn comment(state: Arc<TrackerState>) -> Self {
        let schema = json!({
            "type": "object",
            "properties": {
                "issue": {"type": "integer", "minimum": 1},
                "body": {"type": "string", "minLength": 1},
            },
            "required": ["issue", "body"],
            "additionalProperties": false,
        });
        Self {
            spec: AdapterSpec::new("tracker.comment_issue", schema, Classification::Write)
                .idempotent(),
            state,
        }
    }

    fn close(state: Arc<TrackerState>) -> Self {
        let schema = json!({
            "type": "object",
            "properties": {
                "issue": {"type": "integer", "minimum": 1},
            },
            "required": ["issue"],
            "additionalProperties": false,
        });
        Self {
            spec: AdapterSpec::new("tracker.close_issue", schema, Classification::Write)
                .idempotent(),
            state,
        }
    }
}

#[async_trait::async_trait]
impl Adapter for TrackerAdapter {
    fn spec(&self) -> &AdapterSpec {
        &self.spec
    }

    async fn invoke(&self, args: &Value, _ctx: &InvokeCtx) -> Result<Invocation, AdapterError> {
        match self.spec.id.as_str() {
            "tracker.create_issue" => {
                let title = args["title"].as_str().unwrap_or_default().to_string();
                let mut issues = self.state.issues.lock();
                issues.push(Issue { title: title.clone(), open: true });
                let number = issues.len();
                Ok(Invocation::new(json!({
                    "ok": true,
                    "simulated": true,
                    "issue": number,
                    "title": title,
                })))
            }
            "tracker.comment_issue" => {
                let number = args["issue"].as_u64().unwrap_or(0) as usize;
                let issues = self.state.issues.lock();
                if number == 0 || number > issues.len() {
                    return Err(AdapterError::permanent(format!("issue {number} not found")));
                }
                Ok(Invocation::new(json!({"ok": true, "simulated": true, "issue": number})))
            }
            "tracker.close_issue" => {
                let number = args["issue"].as_u64().unwrap_or(0) as usize;
                let mut issues = self.state.issues.lock();
                match issues.get_mut(number.wrapping_sub(1)) {
                    Some(issue) => {
                        issue.open = false;
                        Ok(Invocation::new(json!({"ok": true, "simulated": true, "issue": number})))
                    }
                    None => Err(AdapterError::permanent(format!("issue {number} not found"))),
                }
            }
            other => Err(AdapterError::permanent(format!("unknown tracker tool {other}"))),
        }
    }
}
