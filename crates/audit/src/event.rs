// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The audit event record.

use fm_core::ActorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One sealed entry in a tenant's audit chain.
///
/// `seq` is dense and gap-free per tenant; `this_hash` covers every field
/// except itself, chained through `prev_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub seq: u64,
    /// RFC 3339 UTC timestamp.
    pub ts: String,
    pub tenant: String,
    pub actor: String,
    pub actor_kind: ActorKind,
    /// Dotted verb, e.g. `run.started`, `step.succeeded`.
    pub action: String,
    pub resource_kind: String,
    pub resource_id: String,
    /// Already redacted before sealing.
    pub payload: Value,
    /// Hex SHA-256 of the previous event; empty string at the genesis.
    pub prev_hash: String,
    pub this_hash: String,
}

impl AuditEvent {
    /// The event as hashed: every field except `this_hash`.
    pub fn hashed_view(&self) -> Value {
        serde_json::json!({
            "seq": self.seq,
            "ts": self.ts,
            "tenant": self.tenant,
            "actor": self.actor,
            "actor_kind": self.actor_kind,
            "action": self.action,
            "resource_kind": self.resource_kind,
            "resource_id": self.resource_id,
            "payload": self.payload,
            "prev_hash": self.prev_hash,
        })
    }
}

/// Unsealed event content handed to [`crate::AuditLog::append`].
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub actor: String,
    pub actor_kind: ActorKind,
    pub action: String,
    pub resource_kind: String,
    pub resource_id: String,
    pub payload: Value,
}

impl EventDraft {
    pub fn new(
        actor: impl Into<String>,
        actor_kind: ActorKind,
        action: impl Into<String>,
        resource_kind: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            actor_kind,
            action: action.into(),
            resource_kind: resource_kind.into(),
            resource_id: resource_id.into(),
            payload: Value::Null,
        }
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}
