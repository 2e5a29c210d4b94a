// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The invocation surface of the core: submit, cancel, decide, get,
//! stream, export.

use crate::approval::ApprovalService;
use crate::backoff::RetryConfig;
use crate::env::EngineEnv;
use crate::error::EngineError;
use crate::executor::Executor;
use crate::runbooks::RunbookStore;
use crate::telemetry::{Telemetry, TelemetryHook};
use fm_adapters::AdapterRegistry;
use fm_agents::{Planner, Reviewer, StubPlanner, StubReviewer, StubToolcaller, Toolcaller};
use fm_audit::{redact, AuditLog, RedactionConfig};
use fm_core::{
    Approval, ApprovalId, Clock, ErrorCode, Run, RunConfig, RunEvent, RunId, RunMode, RunStatus,
    Step, Subject,
};
use fm_policy::PolicyStore;
use fm_store::{MemoryRunStore, RunExport, RunStore};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What `get_run` returns: the run plus its steps and approvals, with
/// secrets redacted. No internal exception text crosses this boundary.
#[derive(Debug, Clone)]
pub struct RunView {
    pub run: Run,
    pub steps: Vec<Step>,
    pub approvals: Vec<Approval>,
}

/// Long-lived service owning the executor and its collaborators.
///
/// The policy store, adapter registry, and audit salt are fixed at
/// construction and never re-initialized while the service is live.
pub struct RunService<C: Clock> {
    store: Arc<dyn RunStore>,
    audit: Arc<AuditLog>,
    policies: Arc<PolicyStore>,
    runbooks: Arc<RunbookStore>,
    executor: Arc<Executor<C>>,
    approvals: Arc<ApprovalService<C>>,
    clock: C,
    salt: String,
    redaction: RedactionConfig,
    cancellations: Mutex<HashMap<RunId, CancellationToken>>,
}

impl<C: Clock> RunService<C> {
    pub fn builder(clock: C) -> RunServiceBuilder<C> {
        RunServiceBuilder::new(clock)
    }

    pub fn policies(&self) -> &Arc<PolicyStore> {
        &self.policies
    }

    pub fn runbooks(&self) -> &Arc<RunbookStore> {
        &self.runbooks
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    /// Create a run from a committed runbook under the tenant's active
    /// policy. A duplicate submission with the same idempotency key
    /// returns the existing run id.
    pub async fn submit_run(
        &self,
        runbook_ref: &str,
        mode: RunMode,
        context: HashMap<String, Value>,
        caller: Subject,
        idempotency_key: Option<String>,
    ) -> Result<RunId, EngineError> {
        if let Some(key) = &idempotency_key {
            if let Some(existing) =
                self.store.find_run_by_idempotency_key(&caller.tenant, key).await?
            {
                tracing::info!(run = %existing, key = %key, "duplicate submit, returning existing run");
                return Ok(existing);
            }
        }

        let (name, version) = match runbook_ref.split_once('@') {
            Some((name, version)) => (name, Some(version)),
            None => (runbook_ref, None),
        };
        let doc = match version {
            Some(version) => self.runbooks.get(&caller.tenant, name, version),
            None => self.runbooks.head(&caller.tenant, name),
        }
        .ok_or_else(|| EngineError::Validation(format!("runbook {runbook_ref} not committed")))?;

        let policy = self
            .policies
            .active(&caller.tenant)
            .ok_or_else(|| EngineError::Validation(format!("no active policy for {}", caller.tenant)))?;

        let now = self.clock.epoch_ms();
        let deadline_ms =
            policy.budgets.max_wall_ms_per_run.map(|cap| now + cap);
        let config = RunConfig {
            runbook_name: doc.name.clone(),
            runbook_version: doc.version_or_default().to_string(),
            mode,
            context,
            caller: caller.clone(),
            policy_name: policy.name.clone(),
            policy_version: policy.version.clone(),
            policy_snapshot: policy.snapshot_value(),
            idempotency_key,
            deadline_ms,
        };
        let run = Run::new(config, now);
        let run_id = run.id;

        self.store.create_run(run).await?;
        self.audit.append(
            &caller.tenant,
            fm_audit::EventDraft::new(&caller.actor, caller.kind, "run.submitted", "run", run_id.as_str())
                .payload(json!({"runbook": runbook_ref, "mode": mode})),
            now,
        )?;
        tracing::info!(run = %run_id, runbook = runbook_ref, %mode, "run submitted");
        Ok(run_id)
    }

    /// Drive a submitted run to its terminal status on this task.
    pub async fn execute(&self, run_id: RunId) -> Result<RunStatus, EngineError> {
        let token = self.cancellation(run_id);
        let result = self.executor.run(run_id, token).await;
        self.cancellations.lock().remove(&run_id);
        match result {
            Err(e) if matches!(e.code(), ErrorCode::Internal | ErrorCode::Store) => {
                // unclassified bugs and exhausted store backoff fail the
                // run with a digest, never the error text
                self.fail_run_with_note(&run_id, &e).await;
                Err(e)
            }
            other => other,
        }
    }

    async fn fail_run_with_note(&self, run_id: &RunId, error: &EngineError) {
        let Ok(Some(mut run)) = self.store.load_run(run_id).await else { return };
        if run.is_terminal() || run.status == RunStatus::Pending {
            return;
        }
        let digest = {
            use sha2::{Digest, Sha256};
            hex::encode(Sha256::digest(error.to_string().as_bytes()))
        };
        let now = self.clock.epoch_ms();
        run.error = Some(fm_core::RunError::new(
            error.code(),
            format!("{} (digest {})", error.code(), &digest[..16]),
        ));
        if run.transition(RunStatus::Failed, now).is_err() {
            return;
        }
        if self.store.save_run(&run).await.is_err() {
            return;
        }
        let _ = self.audit.append(
            &run.tenant,
            fm_audit::EventDraft::new("system", fm_core::ActorKind::System, "run.failed", "run", run_id.as_str())
                .payload(json!({"code": error.code(), "digest": digest})),
            now,
        );
        let _ = self
            .store
            .publish_event(RunEvent::RunTerminated { run_id: *run_id, status: RunStatus::Failed })
            .await;
    }

    /// Drive a submitted run on a background task.
    pub fn spawn(self: &Arc<Self>, run_id: RunId) -> tokio::task::JoinHandle<Result<RunStatus, EngineError>>
    where
        C: 'static,
    {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.execute(run_id).await })
    }

    fn cancellation(&self, run_id: RunId) -> CancellationToken {
        self.cancellations.lock().entry(run_id).or_default().clone()
    }

    /// Request cooperative cancellation. Observed at safe points; an
    /// in-flight adapter call completes and its result is recorded first.
    pub async fn cancel_run(&self, run_id: &RunId, caller: &Subject) -> Result<(), EngineError> {
        let run = self
            .store
            .load_run(run_id)
            .await?
            .ok_or_else(|| EngineError::Validation(format!("unknown run {run_id}")))?;
        if run.tenant != caller.tenant {
            return Err(EngineError::Validation("run belongs to another tenant".into()));
        }
        self.audit.append(
            &caller.tenant,
            fm_audit::EventDraft::new(&caller.actor, caller.kind, "run.cancel_requested", "run", run_id.as_str()),
            self.clock.epoch_ms(),
        )?;
        self.cancellation(*run_id).cancel();
        Ok(())
    }

    /// Resolve a pending approval. Exactly one of two concurrent calls
    /// succeeds.
    pub async fn decide_approval(
        &self,
        approval_id: &ApprovalId,
        decider: &Subject,
        approve: bool,
        comment: Option<String>,
    ) -> Result<Approval, EngineError> {
        self.approvals.decide(approval_id, decider, approve, comment).await
    }

    /// The run, its steps, and its approvals, secrets redacted.
    pub async fn get_run(&self, run_id: &RunId) -> Result<RunView, EngineError> {
        let mut run = self
            .store
            .load_run(run_id)
            .await?
            .ok_or_else(|| EngineError::Validation(format!("unknown run {run_id}")))?;
        let mut steps = self.store.list_steps(run_id).await?;
        let approvals = self.store.list_approvals(run_id).await?;

        // redact before anything caller-facing
        for (_key, value) in run.context.iter_mut() {
            *value = redact(value, &self.redaction, &self.salt, &[]);
        }
        for step in steps.iter_mut() {
            step.args = redact(&step.args, &self.redaction, &self.salt, &[]);
            if let Some(output) = &step.output {
                step.output = Some(redact(output, &self.redaction, &self.salt, &[]));
            }
        }
        Ok(RunView { run, steps, approvals })
    }

    /// Ordered events for a run after `cursor`, with the next cursor.
    /// Restartable: pass the returned cursor to resume.
    pub async fn stream_run_events(
        &self,
        run_id: &RunId,
        cursor: usize,
    ) -> Result<(usize, Vec<RunEvent>), EngineError> {
        Ok(self.store.events_since(run_id, cursor).await?)
    }

    /// Live subscription to a run's events.
    pub fn subscribe_run_events(&self, run_id: &RunId) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.store.subscribe(run_id)
    }

    /// Export a run with its steps, approvals, and the tenant audit
    /// chain, such that the chain re-verifies after import.
    pub async fn export_run(&self, run_id: &RunId) -> Result<RunExport, EngineError> {
        let run = self
            .store
            .load_run(run_id)
            .await?
            .ok_or_else(|| EngineError::Validation(format!("unknown run {run_id}")))?;
        let steps = self.store.list_steps(run_id).await?;
        let approvals = self.store.list_approvals(run_id).await?;
        let audit_events = serde_json::to_value(self.audit.export(&run.tenant))
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        Ok(RunExport { run, steps, approvals, audit_events })
    }

    /// Re-import an exported run into this service. The audit chain must
    /// verify end-to-end or the import is rejected.
    pub async fn import_run(&self, export: RunExport) -> Result<(), EngineError> {
        let events: Vec<fm_audit::AuditEvent> = serde_json::from_value(export.audit_events)
            .map_err(|e| EngineError::Validation(format!("unreadable audit export: {e}")))?;
        self.audit.import(&export.run.tenant, events)?;
        self.store.create_run(export.run).await?;
        for step in &export.steps {
            self.store.save_step(step).await?;
        }
        for approval in &export.approvals {
            self.store.save_approval(approval).await?;
        }
        Ok(())
    }
}

/// Wires the executor and its collaborators. Defaults: in-memory store,
/// builtin mock adapters, stub agents, counting telemetry.
pub struct RunServiceBuilder<C: Clock> {
    clock: C,
    salt: String,
    store: Option<Arc<dyn RunStore>>,
    registry: Option<Arc<AdapterRegistry>>,
    planner: Option<Arc<dyn Planner>>,
    toolcaller: Option<Arc<dyn Toolcaller>>,
    reviewer: Option<Arc<dyn Reviewer>>,
    telemetry: Option<Arc<dyn TelemetryHook>>,
    env: Option<EngineEnv>,
    retry: Option<RetryConfig>,
}

impl<C: Clock> RunServiceBuilder<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            salt: "foreman-audit-salt".to_string(),
            store: None,
            registry: None,
            planner: None,
            toolcaller: None,
            reviewer: None,
            telemetry: None,
            env: None,
            retry: None,
        }
    }

    pub fn salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = salt.into();
        self
    }

    pub fn store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn registry(mut self, registry: Arc<AdapterRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn toolcaller(mut self, toolcaller: Arc<dyn Toolcaller>) -> Self {
        self.toolcaller = Some(toolcaller);
        self
    }

    pub fn reviewer(mut self, reviewer: Arc<dyn Reviewer>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetryHook>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn env(mut self, env: EngineEnv) -> Self {
        self.env = Some(env);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn build(self) -> Arc<RunService<C>> {
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryRunStore::new()));
        let registry =
            self.registry.unwrap_or_else(|| Arc::new(fm_adapters::builtin::standard_registry()));
        let planner = self.planner.unwrap_or_else(|| Arc::new(StubPlanner));
        let toolcaller = self.toolcaller.unwrap_or_else(|| Arc::new(StubToolcaller));
        let reviewer = self.reviewer.unwrap_or_else(|| Arc::new(StubReviewer));
        let telemetry = self.telemetry.unwrap_or_else(|| Arc::new(Telemetry::new()));
        let env = self.env.unwrap_or_default();
        let retry = self.retry.unwrap_or_default();

        let audit = Arc::new(AuditLog::new(self.salt.clone()));
        let policies = Arc::new(PolicyStore::new());
        let runbooks = Arc::new(RunbookStore::new());
        let approvals = Arc::new(ApprovalService::new(
            Arc::clone(&store),
            Arc::clone(&audit),
            self.clock.clone(),
            &self.salt,
        ));
        let executor = Arc::new(Executor::new(
            Arc::clone(&store),
            Arc::clone(&audit),
            Arc::clone(&registry),
            Arc::clone(&runbooks),
            planner,
            toolcaller,
            reviewer,
            Arc::clone(&approvals),
            telemetry,
            env,
            retry,
            self.clock.clone(),
        ));

        Arc::new(RunService {
            store,
            audit,
            policies,
            runbooks,
            executor,
            approvals,
            clock: self.clock,
            salt: self.salt,
            redaction: RedactionConfig::standard(),
            cancellations: Mutex::new(HashMap::new()),
        })
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
