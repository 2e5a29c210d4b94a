// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-tenant serialized append and verification.

use crate::chain::{hash_over, verify_chain, Divergence, GENESIS_HASH};
use crate::event::{AuditEvent, EventDraft};
use crate::redact::{redact, RedactionConfig};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from the audit log. A failed append must fail the operation
/// that requested it; the executor never proceeds past an unlogged
/// side effect.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit append failed: {0}")]
    Append(String),
    #[error("audit chain diverges at seq {}: {} (expected {}, got {})", .0.seq, .0.reason, .0.expected, .0.actual)]
    Diverged(Divergence),
    #[error("audit import rejected: {0}")]
    Import(String),
}

#[derive(Default)]
struct TenantChain {
    events: Vec<AuditEvent>,
}

/// Process-wide append-only audit log.
///
/// The redaction salt is fixed at construction and never rotated while
/// the executor is live; appends for one tenant are serialized by a
/// per-tenant lock.
pub struct AuditLog {
    salt: String,
    config: RedactionConfig,
    tenants: Mutex<HashMap<String, Arc<Mutex<TenantChain>>>>,
}

impl AuditLog {
    pub fn new(salt: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            config: RedactionConfig::standard(),
            tenants: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config(mut self, config: RedactionConfig) -> Self {
        self.config = config;
        self
    }

    fn tenant_chain(&self, tenant: &str) -> Arc<Mutex<TenantChain>> {
        let mut tenants = self.tenants.lock();
        Arc::clone(tenants.entry(tenant.to_string()).or_default())
    }

    /// Seal and append one event. Redaction runs before hashing, so the
    /// chain commits to the redacted form only.
    pub fn append(
        &self,
        tenant: &str,
        draft: EventDraft,
        epoch_ms: u64,
    ) -> Result<AuditEvent, AuditError> {
        self.append_with_secret_keys(tenant, draft, epoch_ms, &[])
    }

    /// Like [`append`](Self::append), with extra argument names the
    /// invoked adapter's schema marks secret.
    pub fn append_with_secret_keys(
        &self,
        tenant: &str,
        draft: EventDraft,
        epoch_ms: u64,
        secret_keys: &[String],
    ) -> Result<AuditEvent, AuditError> {
        let chain = self.tenant_chain(tenant);
        let mut chain = chain.lock();

        let seq = chain.events.len() as u64 + 1;
        let prev_hash = chain
            .events
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let payload = redact(&draft.payload, &self.config, &self.salt, secret_keys);
        let ts = rfc3339_utc(epoch_ms)?;

        let mut event = AuditEvent {
            seq,
            ts,
            tenant: tenant.to_string(),
            actor: draft.actor,
            actor_kind: draft.actor_kind,
            action: draft.action,
            resource_kind: draft.resource_kind,
            resource_id: draft.resource_id,
            payload,
            prev_hash,
            this_hash: String::new(),
        };
        event.this_hash = hash_over(&event.prev_hash, &event.hashed_view());

        tracing::debug!(
            tenant,
            seq,
            action = %event.action,
            resource = %event.resource_id,
            "audit appended"
        );
        chain.events.push(event.clone());
        Ok(event)
    }

    /// All events for a tenant, in sequence order.
    pub fn events(&self, tenant: &str) -> Vec<AuditEvent> {
        self.tenant_chain(tenant).lock().events.clone()
    }

    /// Events tagged to one resource id, in sequence order.
    pub fn events_for_resource(&self, tenant: &str, resource_id: &str) -> Vec<AuditEvent> {
        self.tenant_chain(tenant)
            .lock()
            .events
            .iter()
            .filter(|e| e.resource_id == resource_id)
            .cloned()
            .collect()
    }

    /// Current chain length for a tenant.
    pub fn len(&self, tenant: &str) -> usize {
        self.tenant_chain(tenant).lock().events.len()
    }

    pub fn is_empty(&self, tenant: &str) -> bool {
        self.len(tenant) == 0
    }

    /// Verify the whole chain for a tenant.
    pub fn verify(&self, tenant: &str) -> Result<(), AuditError> {
        verify_chain(&self.events(tenant)).map_err(AuditError::Diverged)
    }

    /// Verify a contiguous sub-range `[from_seq, to_seq]` (1-based).
    pub fn verify_range(&self, tenant: &str, from_seq: u64, to_seq: u64) -> Result<(), AuditError> {
        let events = self.events(tenant);
        let slice: Vec<AuditEvent> = events
            .into_iter()
            .filter(|e| e.seq >= from_seq && e.seq <= to_seq)
            .collect();
        verify_chain(&slice).map_err(AuditError::Diverged)
    }

    /// Export a tenant's chain for archival or migration.
    pub fn export(&self, tenant: &str) -> Vec<AuditEvent> {
        self.events(tenant)
    }

    /// Import a previously exported chain into an empty tenant slot.
    /// The chain must verify end-to-end.
    pub fn import(&self, tenant: &str, events: Vec<AuditEvent>) -> Result<(), AuditError> {
        verify_chain(&events).map_err(AuditError::Diverged)?;
        let chain = self.tenant_chain(tenant);
        let mut chain = chain.lock();
        if !chain.events.is_empty() {
            return Err(AuditError::Import(format!(
                "tenant {tenant} already has {} events",
                chain.events.len()
            )));
        }
        if let Some(first) = events.first() {
            if first.seq != 1 || first.prev_hash != GENESIS_HASH {
                return Err(AuditError::Import("chain must start at the genesis".into()));
            }
        }
        chain.events = events;
        Ok(())
    }
}

fn rfc3339_utc(epoch_ms: u64) -> Result<String, AuditError> {
    let ts: DateTime<Utc> = DateTime::from_timestamp_millis(epoch_ms as i64)
        .ok_or_else(|| AuditError::Append(format!("timestamp {epoch_ms} out of range")))?;
    Ok(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
