// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run identifier and state machine.

use crate::error::RunError;
use crate::step::Usage;
use crate::subject::Subject;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a run instance.
    ///
    /// Each submission gets a unique ID used to track its state, query
    /// status, and tag its audit events.
    pub struct RunId("run-");
}

/// How a run treats its effectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Record intended invocations, never call adapters.
    DryRun,
    /// Execute against the recording shim and score against the reference list.
    Shadow,
    /// Call the real adapters.
    Execute,
}

impl RunMode {
    /// Whether this mode may reach a real effector.
    pub fn invokes_adapters(&self) -> bool {
        matches!(self, RunMode::Execute)
    }
}

crate::simple_display! {
    RunMode {
        DryRun => "dry_run",
        Shadow => "shadow",
        Execute => "execute",
    }
}

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    AwaitingApproval,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed | RunStatus::Cancelled)
    }

    /// Legal transitions, exactly:
    ///
    /// ```text
    /// pending           → running
    /// running           → running | awaiting_approval | succeeded | failed | cancelled
    /// awaiting_approval → running | failed | cancelled
    /// ```
    pub fn can_transition_to(&self, to: RunStatus) -> bool {
        use RunStatus::*;
        match (self, to) {
            (Pending, Running) => true,
            (Running, Running | AwaitingApproval | Succeeded | Failed | Cancelled) => true,
            (AwaitingApproval, Running | Failed | Cancelled) => true,
            _ => false,
        }
    }
}

crate::simple_display! {
    RunStatus {
        Pending => "pending",
        Running => "running",
        AwaitingApproval => "awaiting_approval",
        Succeeded => "succeeded",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Attempted illegal status transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal run transition {from} → {to}")]
pub struct TransitionError {
    pub from: RunStatus,
    pub to: RunStatus,
}

/// Aggregated usage totals for a run. Monotonically non-decreasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    #[serde(default)]
    pub tokens_in: u64,
    #[serde(default)]
    pub tokens_out: u64,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub wall_ms: u64,
}

impl RunMetrics {
    pub fn absorb(&mut self, usage: &Usage) {
        self.tokens_in += usage.tokens_in;
        self.tokens_out += usage.tokens_out;
        self.cost_usd += usage.cost_usd;
        self.wall_ms += usage.wall_ms;
    }

    pub fn total_tokens(&self) -> u64 {
        self.tokens_in + self.tokens_out
    }
}

/// Configuration for creating a new run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub runbook_name: String,
    pub runbook_version: String,
    pub mode: RunMode,
    pub context: HashMap<String, serde_json::Value>,
    pub caller: Subject,
    pub policy_name: String,
    pub policy_version: String,
    /// Full policy document captured at submit time. Later policy edits
    /// must not retro-change this run's decisions.
    pub policy_snapshot: serde_json::Value,
    pub idempotency_key: Option<String>,
    /// Wall-clock deadline for the whole run, if any.
    pub deadline_ms: Option<u64>,
}

impl RunConfig {
    pub fn new(runbook_name: impl Into<String>, mode: RunMode, caller: Subject) -> Self {
        Self {
            runbook_name: runbook_name.into(),
            runbook_version: String::new(),
            mode,
            context: HashMap::new(),
            caller,
            policy_name: String::new(),
            policy_version: String::new(),
            policy_snapshot: serde_json::Value::Null,
            idempotency_key: None,
            deadline_ms: None,
        }
    }

    crate::setters! {
        into {
            runbook_version: String,
            policy_name: String,
            policy_version: String,
        }
        set {
            context: HashMap<String, serde_json::Value>,
            policy_snapshot: serde_json::Value,
        }
        option {
            idempotency_key: String,
            deadline_ms: u64,
        }
    }
}

/// One execution of one runbook at one policy version with one context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub tenant: String,
    pub runbook_name: String,
    pub runbook_version: String,
    pub mode: RunMode,
    pub status: RunStatus,
    pub context: HashMap<String, serde_json::Value>,
    pub caller: Subject,
    pub policy_name: String,
    pub policy_version: String,
    pub policy_snapshot: serde_json::Value,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default)]
    pub metrics: RunMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    /// Shadow comparator report, attached when the run executes in
    /// shadow mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<serde_json::Value>,
}

impl Run {
    pub fn new(config: RunConfig, epoch_ms: u64) -> Self {
        let tenant = config.caller.tenant.clone();
        Self {
            id: RunId::new(),
            tenant,
            runbook_name: config.runbook_name,
            runbook_version: config.runbook_version,
            mode: config.mode,
            status: RunStatus::Pending,
            context: config.context,
            caller: config.caller,
            policy_name: config.policy_name,
            policy_version: config.policy_version,
            policy_snapshot: config.policy_snapshot,
            created_at_ms: epoch_ms,
            completed_at_ms: None,
            metrics: RunMetrics::default(),
            error: None,
            idempotency_key: config.idempotency_key,
            deadline_ms: config.deadline_ms,
            shadow: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Enforce the status machine. `completed_at_ms` is set exactly when
    /// the run turns terminal.
    pub fn transition(&mut self, to: RunStatus, epoch_ms: u64) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError { from: self.status, to });
        }
        self.status = to;
        if to.is_terminal() {
            self.completed_at_ms.get_or_insert(epoch_ms);
        }
        Ok(())
    }
}

crate::builder! {
    pub struct RunBuilder => Run {
        into {
            tenant: String = "acme",
            runbook_name: String = "restart-web",
            runbook_version: String = "1",
            policy_name: String = "default",
            policy_version: String = "1",
        }
        set {
            mode: RunMode = RunMode::Execute,
            status: RunStatus = RunStatus::Pending,
            context: HashMap<String, serde_json::Value> = HashMap::new(),
            caller: Subject = Subject::new("acme", "op@acme", crate::subject::ActorKind::User),
            policy_snapshot: serde_json::Value = serde_json::Value::Null,
            metrics: RunMetrics = RunMetrics::default(),
        }
        option {
            completed_at_ms: u64 = None,
            error: RunError = None,
            idempotency_key: String = None,
            deadline_ms: u64 = None,
            shadow: serde_json::Value = None,
        }
        computed {
            id: RunId = RunId::new(),
            created_at_ms: u64 = 1_000_000,
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
