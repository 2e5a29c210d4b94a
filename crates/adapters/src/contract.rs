// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The uniform invocation contract every effector implements.

use fm_core::Usage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Blast-radius classification of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Read,
    Write,
    Destructive,
}

impl Classification {
    /// Write and destructive effects participate in compensation.
    pub fn has_side_effects(&self) -> bool {
        matches!(self, Classification::Write | Classification::Destructive)
    }
}

fm_core::simple_display! {
    Classification {
        Read => "read",
        Write => "write",
        Destructive => "destructive",
    }
}

/// Failure classes an adapter may surface. Only `Transient` and `Timeout`
/// are retried by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    ValidationFailed,
    PreconditionFailed,
    Transient,
    Permanent,
    Timeout,
    Unauthorized,
}

impl AdapterErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterErrorKind::Transient | AdapterErrorKind::Timeout)
    }
}

fm_core::simple_display! {
    AdapterErrorKind {
        ValidationFailed => "validation_failed",
        PreconditionFailed => "precondition_failed",
        Transient => "transient",
        Permanent => "permanent",
        Timeout => "timeout",
        Unauthorized => "unauthorized",
    }
}

/// Adapter failure as a value; the executor matches on the kind
/// discriminant, never on message text.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub message: String,
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Permanent, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Timeout, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::ValidationFailed, message)
    }
}

/// Successful invocation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub output: Value,
    pub usage: Usage,
}

impl Invocation {
    pub fn new(output: Value) -> Self {
        Self { output, usage: Usage::default() }
    }
}

/// Call-scoped context passed to adapters. Deliberately narrow: adapters
/// may not reach back into the run store or other adapters.
#[derive(Debug, Clone, Default)]
pub struct InvokeCtx {
    pub tenant: String,
    pub run_id: String,
    /// Deduplication token for non-idempotent operations.
    pub idempotency_key: Option<String>,
}

const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Static registration record for one tool id.
#[derive(Debug, Clone)]
pub struct AdapterSpec {
    /// Dotted, lower-case, stable identifier.
    pub id: String,
    /// Argument shape (JSON schema object subset, see [`crate::validate_args`]).
    pub schema: Value,
    pub classification: Classification,
    /// Safe to retry on transport failure without a dedup token.
    pub idempotent: bool,
    /// Inverse operation invoked during compensation, if declared.
    pub compensation: Option<String>,
    /// Maximum wall clock for one invocation.
    pub timeout_ms: u64,
    /// Reads that may be force-interrupted on cancellation.
    pub safe_to_interrupt: bool,
}

impl AdapterSpec {
    pub fn new(id: impl Into<String>, schema: Value, classification: Classification) -> Self {
        Self {
            id: id.into(),
            schema,
            classification,
            idempotent: false,
            compensation: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            safe_to_interrupt: false,
        }
    }

    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    pub fn compensated_by(mut self, tool: impl Into<String>) -> Self {
        self.compensation = Some(tool.into());
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn safe_to_interrupt(mut self) -> Self {
        self.safe_to_interrupt = true;
        self
    }
}

/// An effector behind a tool id.
#[async_trait::async_trait]
pub trait Adapter: Send + Sync {
    fn spec(&self) -> &AdapterSpec;

    /// Perform the external effect. Pure with respect to the registry:
    /// no other adapter and no store is consulted.
    async fn invoke(&self, args: &Value, ctx: &InvokeCtx) -> Result<Invocation, AdapterError>;

    /// Reconcile a possibly-applied non-idempotent call after a crash.
    /// Adapters without an idempotency API return `None` and the step
    /// outcome stays unknown.
    async fn lookup(&self, _idempotency_key: &str) -> Option<Invocation> {
        None
    }
}

#[cfg(test)]
#[path = "contract_tests.rs"]
mod tests;
