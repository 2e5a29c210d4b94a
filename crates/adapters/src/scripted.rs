// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted adapter for tests: returns a queued sequence of results.

use crate::contract::{
    Adapter, AdapterError, AdapterSpec, Classification, Invocation, InvokeCtx,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A test double whose responses are scripted up front. Once the script
/// is exhausted it keeps returning a plain success.
pub struct ScriptedAdapter {
    spec: AdapterSpec,
    script: Mutex<Vec<Result<Invocation, AdapterError>>>,
    calls: Mutex<Vec<Value>>,
    lookups: Mutex<HashMap<String, Invocation>>,
}

impl ScriptedAdapter {
    pub fn new(id: &str, classification: Classification) -> Self {
        Self {
            spec: AdapterSpec::new(id, json!({"type": "object"}), classification),
            script: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            lookups: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_spec(spec: AdapterSpec) -> Self {
        Self {
            spec,
            script: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            lookups: Mutex::new(HashMap::new()),
        }
    }

    /// Queue the next invocation result (consumed in order).
    pub fn push(&self, result: Result<Invocation, AdapterError>) {
        self.script.lock().push(result);
    }

    /// Pre-load an idempotency lookup response.
    pub fn preload_lookup(&self, key: &str, invocation: Invocation) {
        self.lookups.lock().insert(key.to_string(), invocation);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().clone()
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait::async_trait]
impl Adapter for ScriptedAdapter {
    fn spec(&self) -> &AdapterSpec {
        &self.spec
    }

    async fn invoke(&self, args: &Value, _ctx: &InvokeCtx) -> Result<Invocation, AdapterError> {
        self.calls.lock().push(args.clone());
        let mut script = self.script.lock();
        if script.is_empty() {
            return Ok(Invocation::new(json!({"ok": true})));
        }
        script.remove(0)
    }

    async fn lookup(&self, idempotency_key: &str) -> Option<Invocation> {
        self.lookups.lock().get(idempotency_key).cloned()
    }
}
