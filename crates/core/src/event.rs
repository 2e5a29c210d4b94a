// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run lifecycle events streamed to callers.
//!
//! Serializes with `{"type": "noun:verb", ...fields}` format. These are the
//! read-side stream of `stream_run_events`; the audit chain remains the
//! source of truth.

use crate::approval::{ApprovalId, ApprovalState};
use crate::run::{RunId, RunMode, RunStatus};
use crate::step::StepStatus;
use serde::{Deserialize, Serialize};

/// Events emitted as a run progresses, ordered per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    #[serde(rename = "run:started")]
    RunStarted { run_id: RunId, mode: RunMode },

    #[serde(rename = "step:started")]
    StepStarted { run_id: RunId, index: u32, name: String, tool: String },

    #[serde(rename = "step:finished")]
    StepFinished {
        run_id: RunId,
        index: u32,
        name: String,
        status: StepStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    #[serde(rename = "approval:requested")]
    ApprovalRequested { run_id: RunId, index: u32, approval_id: ApprovalId },

    #[serde(rename = "approval:resolved")]
    ApprovalResolved {
        run_id: RunId,
        index: u32,
        approval_id: ApprovalId,
        state: ApprovalState,
    },

    #[serde(rename = "run:terminated")]
    RunTerminated { run_id: RunId, status: RunStatus },
}

impl RunEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::StepStarted { run_id, .. }
            | RunEvent::StepFinished { run_id, .. }
            | RunEvent::ApprovalRequested { run_id, .. }
            | RunEvent::ApprovalResolved { run_id, .. }
            | RunEvent::RunTerminated { run_id, .. } => *run_id,
        }
    }

    /// Whether this event closes the stream for its run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::RunTerminated { .. })
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
