// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run store contract.

use fm_core::{Approval, ApprovalId, Run, RunEvent, RunId, Step};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default time-bounded exclusive right to mutate one run.
pub const DEFAULT_LEASE_TTL_MS: u64 = 30_000;

/// Store-level failures. `LeaseLost` tells the current executor instance
/// to abandon the run without further mutation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("duplicate: {0}")]
    Duplicate(String),
    #[error("run lease held by {owner}")]
    LeaseHeld { owner: String },
    #[error("run lease lost")]
    LeaseLost,
    #[error("store failure: {0}")]
    Io(String),
}

/// A held lease. The token fences stale owners: renewal with an old
/// token fails even if the owner string matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub run_id: RunId,
    pub owner: String,
    pub token: u64,
    pub expires_at_ms: u64,
}

/// Everything needed to rebuild a run elsewhere. The audit slice must
/// re-verify after import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunExport {
    pub run: Run,
    pub steps: Vec<Step>,
    pub approvals: Vec<Approval>,
    /// Audit events tagged to the run, in sequence order. Hash-chain
    /// fields are preserved verbatim.
    pub audit_events: serde_json::Value,
}

/// Persisted projection of runs, steps, and approvals.
///
/// Writes to a single run are serialized by the executor (single writer
/// per run, enforced via leases); reads observe acknowledged writes.
#[async_trait::async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: Run) -> Result<(), StoreError>;
    async fn load_run(&self, run_id: &RunId) -> Result<Option<Run>, StoreError>;
    async fn save_run(&self, run: &Run) -> Result<(), StoreError>;

    /// Upsert keyed by (run_id, index).
    async fn save_step(&self, step: &Step) -> Result<(), StoreError>;
    /// Steps ordered by index.
    async fn list_steps(&self, run_id: &RunId) -> Result<Vec<Step>, StoreError>;

    async fn save_approval(&self, approval: &Approval) -> Result<(), StoreError>;
    async fn load_approval(&self, id: &ApprovalId) -> Result<Option<Approval>, StoreError>;
    /// Approvals for one run, in creation order.
    async fn list_approvals(&self, run_id: &RunId) -> Result<Vec<Approval>, StoreError>;

    /// Resolve a prior submission with the same idempotency key.
    async fn find_run_by_idempotency_key(
        &self,
        tenant: &str,
        key: &str,
    ) -> Result<Option<RunId>, StoreError>;

    /// Append to the run's ordered event stream.
    async fn publish_event(&self, event: RunEvent) -> Result<(), StoreError>;
    /// Events after `cursor` (0 = from the start), with the next cursor.
    /// Lazy and restartable: a reconnecting consumer resumes from the
    /// cursor it last saw.
    async fn events_since(
        &self,
        run_id: &RunId,
        cursor: usize,
    ) -> Result<(usize, Vec<RunEvent>), StoreError>;
    /// Live notification of new events for one run.
    fn subscribe(&self, run_id: &RunId) -> tokio::sync::broadcast::Receiver<RunEvent>;

    /// Acquire the single-writer lease for a run.
    async fn acquire_lease(
        &self,
        run_id: &RunId,
        owner: &str,
        ttl_ms: u64,
        now_ms: u64,
    ) -> Result<Lease, StoreError>;
    /// Extend a held lease; fails with `LeaseLost` when fenced.
    async fn renew_lease(&self, lease: &Lease, now_ms: u64) -> Result<Lease, StoreError>;
    async fn release_lease(&self, lease: &Lease) -> Result<(), StoreError>;
}
