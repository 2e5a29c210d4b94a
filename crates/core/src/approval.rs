// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Approval types for human-in-the-loop step gating.

use crate::run::RunId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an approval.
    pub struct ApprovalId("apv-");
}

/// Lifecycle of an approval. Pending resolves exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
    Denied,
    Expired,
}

impl ApprovalState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalState::Pending)
    }

    /// Denied and Expired both read as "do not proceed" to the executor.
    pub fn permits_invocation(&self) -> bool {
        matches!(self, ApprovalState::Approved)
    }
}

crate::simple_display! {
    ApprovalState {
        Pending => "pending",
        Approved => "approved",
        Denied => "denied",
        Expired => "expired",
    }
}

/// Signed handle handed to out-of-band approvers. The signature binds the
/// nonce and expiry so a replayed or forged token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalToken {
    pub nonce: String,
    pub sig: String,
    pub expires_at_ms: u64,
}

/// An approval awaiting (or resolved by) a human decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub id: ApprovalId,
    pub run_id: RunId,
    pub step_index: u32,
    /// Subject string of the run caller that triggered the request.
    pub requested_by: String,
    pub reason: String,
    pub state: ApprovalState,
    /// Roles allowed to decide; empty means any role.
    #[serde(default)]
    pub required_roles: Vec<String>,
    /// When true, the run caller may decide their own approval
    /// (four-eyes rule disabled for this rule).
    #[serde(default)]
    pub allow_self: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at_ms: u64,
    pub expiry_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<ApprovalToken>,
}

impl Approval {
    pub fn is_resolved(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the approval's deadline has passed. Expiry exactly at the
    /// deadline counts as expired.
    pub fn is_past_expiry(&self, epoch_ms: u64) -> bool {
        epoch_ms >= self.expiry_at_ms
    }

    /// Record a terminal decision. Returns false if already resolved,
    /// so racing deciders observe a conflict instead of a double write.
    pub fn resolve(
        &mut self,
        state: ApprovalState,
        decider: impl Into<String>,
        comment: Option<String>,
        epoch_ms: u64,
    ) -> bool {
        debug_assert!(state.is_terminal(), "resolve called with {state}");
        if self.is_resolved() {
            return false;
        }
        self.state = state;
        self.decider = Some(decider.into());
        self.comment = comment;
        self.decided_at_ms = Some(epoch_ms);
        true
    }
}

#[cfg(test)]
#[path = "approval_tests.rs"]
mod tests;
