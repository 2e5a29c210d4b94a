// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory reference implementation of [`RunStore`].

use crate::store::{Lease, RunStore, StoreError};
use fm_core::{Approval, ApprovalId, Run, RunEvent, RunId, Step};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;

struct LeaseRow {
    owner: String,
    token: u64,
    expires_at_ms: u64,
}

#[derive(Default)]
struct Inner {
    runs: HashMap<RunId, Run>,
    steps: HashMap<RunId, Vec<Step>>,
    approvals: HashMap<ApprovalId, Approval>,
    approval_order: HashMap<RunId, Vec<ApprovalId>>,
    idempotency: HashMap<(String, String), RunId>,
    events: HashMap<RunId, Vec<RunEvent>>,
    leases: HashMap<RunId, LeaseRow>,
    next_lease_token: u64,
}

/// Reference store: a single mutex over all maps gives read-your-writes
/// trivially; production implementations shard by tenant.
#[derive(Default)]
pub struct MemoryRunStore {
    inner: Mutex<Inner>,
    channels: Mutex<HashMap<RunId, broadcast::Sender<RunEvent>>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, run_id: &RunId) -> broadcast::Sender<RunEvent> {
        let mut channels = self.channels.lock();
        channels.entry(*run_id).or_insert_with(|| broadcast::channel(256).0).clone()
    }
}

#[async_trait::async_trait]
impl RunStore for MemoryRunStore {
    async fn create_run(&self, run: Run) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.runs.contains_key(&run.id) {
            return Err(StoreError::Duplicate(format!("run {} already exists", run.id)));
        }
        if let Some(key) = &run.idempotency_key {
            inner.idempotency.insert((run.tenant.clone(), key.clone()), run.id);
        }
        inner.runs.insert(run.id, run);
        Ok(())
    }

    async fn load_run(&self, run_id: &RunId) -> Result<Option<Run>, StoreError> {
        Ok(self.inner.lock().runs.get(run_id).cloned())
    }

    async fn save_run(&self, run: &Run) -> Result<(), StoreError> {
        self.inner.lock().runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn save_step(&self, step: &Step) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let steps = inner.steps.entry(step.run_id).or_default();
        match steps.iter_mut().find(|s| s.index == step.index) {
            Some(existing) => *existing = step.clone(),
            None => {
                steps.push(step.clone());
                steps.sort_by_key(|s| s.index);
            }
        }
        Ok(())
    }

    async fn list_steps(&self, run_id: &RunId) -> Result<Vec<Step>, StoreError> {
        Ok(self.inner.lock().steps.get(run_id).cloned().unwrap_or_default())
    }

    async fn save_approval(&self, approval: &Approval) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let order = inner.approval_order.entry(approval.run_id).or_default();
        if !order.contains(&approval.id) {
            order.push(approval.id);
        }
        inner.approvals.insert(approval.id, approval.clone());
        Ok(())
    }

    async fn load_approval(&self, id: &ApprovalId) -> Result<Option<Approval>, StoreError> {
        Ok(self.inner.lock().approvals.get(id).cloned())
    }

    async fn list_approvals(&self, run_id: &RunId) -> Result<Vec<Approval>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .approval_order
            .get(run_id)
            .map(|ids| ids.iter().filter_map(|id| inner.approvals.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn find_run_by_idempotency_key(
        &self,
        tenant: &str,
        key: &str,
    ) -> Result<Option<RunId>, StoreError> {
        Ok(self
            .inner
            .lock()
            .idempotency
            .get(&(tenant.to_string(), key.to_string()))
            .copied())
    }

    async fn publish_event(&self, event: RunEvent) -> Result<(), StoreError> {
        let run_id = event.run_id();
        self.inner.lock().events.entry(run_id).or_default().push(event.clone());
        // receivers may lag or be absent; the durable list above is
        // what cursors replay from
        let _ = self.channel(&run_id).send(event);
        Ok(())
    }

    async fn events_since(
        &self,
        run_id: &RunId,
        cursor: usize,
    ) -> Result<(usize, Vec<RunEvent>), StoreError> {
        let inner = self.inner.lock();
        let events = inner.events.get(run_id).cloned().unwrap_or_default();
        let tail: Vec<RunEvent> = events.iter().skip(cursor).cloned().collect();
        Ok((events.len(), tail))
    }

    fn subscribe(&self, run_id: &RunId) -> broadcast::Receiver<RunEvent> {
        self.channel(run_id).subscribe()
    }

    async fn acquire_lease(
        &self,
        run_id: &RunId,
        owner: &str,
        ttl_ms: u64,
        now_ms: u64,
    ) -> Result<Lease, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(row) = inner.leases.get(run_id) {
            if row.expires_at_ms > now_ms && row.owner != owner {
                return Err(StoreError::LeaseHeld { owner: row.owner.clone() });
            }
        }
        inner.next_lease_token += 1;
        let token = inner.next_lease_token;
        let expires_at_ms = now_ms + ttl_ms;
        inner.leases.insert(
            *run_id,
            LeaseRow { owner: owner.to_string(), token, expires_at_ms },
        );
        Ok(Lease { run_id: *run_id, owner: owner.to_string(), token, expires_at_ms })
    }

    async fn renew_lease(&self, lease: &Lease, now_ms: u64) -> Result<Lease, StoreError> {
        let mut inner = self.inner.lock();
        match inner.leases.get_mut(&lease.run_id) {
            Some(row) if row.token == lease.token => {
                row.expires_at_ms = now_ms + crate::DEFAULT_LEASE_TTL_MS;
                Ok(Lease { expires_at_ms: row.expires_at_ms, ..lease.clone() })
            }
            _ => Err(StoreError::LeaseLost),
        }
    }

    async fn release_lease(&self, lease: &Lease) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(row) = inner.leases.get(&lease.run_id) {
            if row.token == lease.token {
                inner.leases.remove(&lease.run_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
