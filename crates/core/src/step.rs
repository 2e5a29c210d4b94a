// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step identifier, status machine, and usage accounting.

use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a step row.
    ///
    /// Steps are addressed by (run_id, index) in the executor; the id
    /// exists so compensation rows and audit events have a stable handle.
    pub struct StepId("stp-");
}

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Materialized but not yet gated
    Pending,
    /// Adapter invocation in flight
    Running,
    /// Adapter returned ok
    Succeeded,
    /// Adapter returned a definitive failure (or retries exhausted)
    Failed,
    /// Gated out but the run continued (continue_on_error)
    Skipped,
    /// Rollback row produced by compensation
    Compensated,
    /// Policy or reviewer refused the invocation
    Blocked,
}

impl StepStatus {
    /// Terminal statuses are never re-entered; the executor skips
    /// terminal steps on resume.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepStatus::Pending | StepStatus::Running)
    }

    /// Statuses that keep a run eligible for overall success.
    pub fn counts_as_success(&self) -> bool {
        matches!(self, StepStatus::Succeeded | StepStatus::Skipped | StepStatus::Compensated)
    }
}

crate::simple_display! {
    StepStatus {
        Pending => "pending",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Skipped => "skipped",
        Compensated => "compensated",
        Blocked => "blocked",
    }
}

/// Token and cost accounting for one step (or one agent/adapter call).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub tokens_in: u64,
    #[serde(default)]
    pub tokens_out: u64,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub wall_ms: u64,
}

impl Usage {
    /// Fold another usage record into this one. All counters only grow.
    pub fn absorb(&mut self, other: &Usage) {
        self.tokens_in += other.tokens_in;
        self.tokens_out += other.tokens_out;
        self.cost_usd += other.cost_usd;
        self.wall_ms += other.wall_ms;
    }
}

/// Structured step failure surfaced through `get_run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    pub code: ErrorCode,
    pub reason: String,
}

impl StepError {
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self { code, reason: reason.into() }
    }
}

/// One entry in the ordered execution of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub run_id: crate::run::RunId,
    /// Dense 0-based position within the run.
    pub index: u32,
    pub name: String,
    pub tool: String,
    pub args: serde_json::Value,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    #[serde(default)]
    pub usage: Usage,
    /// Incremented each time the adapter is actually called.
    #[serde(default)]
    pub attempts: u32,
    /// Set on compensation rows: the index of the step being rolled back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensates_step_index: Option<u32>,
    /// Deduplication token written before a non-idempotent invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Step {
    /// Materialize a fresh pending step.
    pub fn pending(
        run_id: crate::run::RunId,
        index: u32,
        name: impl Into<String>,
        tool: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self {
            id: StepId::new(),
            run_id,
            index,
            name: name.into(),
            tool: tool.into(),
            args,
            status: StepStatus::Pending,
            started_at_ms: None,
            finished_at_ms: None,
            output: None,
            error: None,
            usage: Usage::default(),
            attempts: 0,
            compensates_step_index: None,
            idempotency_key: None,
        }
    }

    /// Move to `Running`, stamping `started_at_ms` on first entry.
    pub fn start(&mut self, epoch_ms: u64) {
        self.status = StepStatus::Running;
        self.started_at_ms.get_or_insert(epoch_ms);
    }

    /// Move to a terminal status, stamping `finished_at_ms` once.
    ///
    /// Terminal statuses are sticky: finishing an already-terminal step
    /// is a no-op so crash-recovery replays cannot rewrite history.
    pub fn finish(&mut self, status: StepStatus, epoch_ms: u64) {
        debug_assert!(status.is_terminal(), "finish called with {status}");
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.finished_at_ms.get_or_insert(epoch_ms);
    }

    pub fn fail(&mut self, error: StepError, epoch_ms: u64) {
        self.error = Some(error);
        self.finish(StepStatus::Failed, epoch_ms);
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
