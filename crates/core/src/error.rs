// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable error taxonomy surfaced at the run boundary.

use serde::{Deserialize, Serialize};

/// Machine-readable failure classes. The wire strings are a compatibility
/// surface: callers match on them, so variants are never renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed runbook, args, or policy.
    Validation,
    /// Policy block or deny-by-expiry.
    Policy,
    /// Retryable transport or rate-limit failure.
    AdapterTransient,
    /// Effector returned a definitive failure.
    AdapterPermanent,
    /// Adapter deadline exceeded.
    AdapterTimeout,
    /// LLM returned non-conforming JSON after all retries.
    AgentMalformed,
    /// Persistence failure.
    Store,
    /// Lease lost or duplicate run id.
    Concurrency,
    /// Otherwise-unclassified bug.
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "validation",
            ErrorCode::Policy => "policy",
            ErrorCode::AdapterTransient => "adapter_transient",
            ErrorCode::AdapterPermanent => "adapter_permanent",
            ErrorCode::AdapterTimeout => "adapter_timeout",
            ErrorCode::AgentMalformed => "agent_malformed",
            ErrorCode::Store => "store",
            ErrorCode::Concurrency => "concurrency",
            ErrorCode::Internal => "internal",
        }
    }

    /// Only transient transport failures and timeouts are retried by the
    /// executor; everything else surfaces immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::AdapterTransient | ErrorCode::AdapterTimeout)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal run failure: stable code, human reason, failing step.
///
/// No internal exception text crosses this boundary; the reason is
/// composed by the executor, not propagated from adapters verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub code: ErrorCode,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<u32>,
}

impl RunError {
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self { code, reason: reason.into(), step_index: None }
    }

    pub fn at_step(mut self, index: u32) -> Self {
        self.step_index = Some(index);
        self
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.step_index {
            Some(i) => write!(f, "{} at step {}: {}", self.code, i, self.reason),
            None => write!(f, "{}: {}", self.code, self.reason),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
