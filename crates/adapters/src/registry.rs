// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool id → adapter dispatch.

use crate::contract::{Adapter, AdapterError, AdapterErrorKind, Invocation, InvokeCtx};
use crate::schema::validate_args;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Process-wide adapter registry. Populated during startup, then sealed;
/// lookup is lock-free afterwards.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its spec id. Last registration wins;
    /// duplicate ids during startup are a wiring bug worth surfacing.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        let id = adapter.spec().id.clone();
        if self.adapters.insert(id.clone(), adapter).is_some() {
            tracing::warn!(tool = %id, "adapter re-registered, previous entry replaced");
        }
    }

    pub fn get(&self, tool: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(tool).cloned()
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.adapters.contains_key(tool)
    }

    pub fn tool_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.adapters.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Invoke a tool with argument validation and the spec's wall-clock
    /// budget applied. `usage.wall_ms` is filled from the measured
    /// elapsed time when the adapter does not report its own.
    pub async fn invoke(
        &self,
        tool: &str,
        args: &Value,
        ctx: &InvokeCtx,
    ) -> Result<Invocation, AdapterError> {
        let adapter = self.get(tool).ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::Permanent, format!("no adapter for {tool}"))
        })?;
        let spec = adapter.spec();

        if let Err(violation) = validate_args(&spec.schema, args) {
            return Err(AdapterError::validation(violation.to_string()));
        }

        let start = std::time::Instant::now();
        let result =
            tokio::time::timeout(Duration::from_millis(spec.timeout_ms), adapter.invoke(args, ctx))
                .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Err(_) => {
                tracing::warn!(tool, elapsed_ms, "adapter timed out");
                Err(AdapterError::timeout(format!(
                    "{tool} exceeded {}ms budget",
                    spec.timeout_ms
                )))
            }
            Ok(Err(e)) => {
                tracing::warn!(tool, elapsed_ms, kind = %e.kind, "adapter failed");
                Err(e)
            }
            Ok(Ok(mut invocation)) => {
                if invocation.usage.wall_ms == 0 {
                    invocation.usage.wall_ms = elapsed_ms;
                }
                tracing::info!(tool, elapsed_ms, "adapter invoked");
                Ok(invocation)
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
