// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-boundary error type.

use fm_adapters::{AdapterError, AdapterErrorKind};
use fm_agents::AgentError;
use fm_audit::AuditError;
use fm_core::ErrorCode;
use fm_store::StoreError;
use thiserror::Error;

/// Errors crossing the engine boundary. Each maps onto a stable
/// [`ErrorCode`] for callers.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("policy: {0}")]
    Policy(String),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error("concurrency: {0}")]
    Concurrency(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Validation(_) => ErrorCode::Validation,
            EngineError::Policy(_) => ErrorCode::Policy,
            EngineError::Adapter(e) => match e.kind {
                AdapterErrorKind::Transient => ErrorCode::AdapterTransient,
                AdapterErrorKind::Timeout => ErrorCode::AdapterTimeout,
                AdapterErrorKind::ValidationFailed => ErrorCode::Validation,
                _ => ErrorCode::AdapterPermanent,
            },
            EngineError::Agent(AgentError::Malformed(_)) => ErrorCode::AgentMalformed,
            EngineError::Agent(AgentError::Transport(_)) => ErrorCode::AdapterTransient,
            EngineError::Store(StoreError::LeaseHeld { .. } | StoreError::LeaseLost) => {
                ErrorCode::Concurrency
            }
            EngineError::Store(_) => ErrorCode::Store,
            EngineError::Audit(_) => ErrorCode::Store,
            EngineError::Concurrency(_) => ErrorCode::Concurrency,
            EngineError::Internal(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
