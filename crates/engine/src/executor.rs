// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run executor state machine.
//!
//! Drives a run from creation to a terminal status durably, idempotently,
//! and observably. Every step-level effect (materialize, record, audit
//! append) survives process crashes such that restart resumes at the next
//! non-terminal step and replays the same externally visible history.

use crate::approval::ApprovalService;
use crate::backoff::RetryConfig;
use crate::env::EngineEnv;
use crate::error::EngineError;
use crate::runbooks::RunbookStore;
use crate::shadow;
use crate::telemetry::{Counter, Histogram, TelemetryHook};
use fm_adapters::{
    AdapterErrorKind, AdapterRegistry, Classification, IntentRecorder, InvokeCtx,
};
use fm_agents::{
    AgentError, PlannedStep, Planner, ReviewRequest, Reviewer, Toolcaller,
};
use fm_audit::{canonicalize, AuditLog, EventDraft};
use fm_core::{
    Clock, ErrorCode, Run, RunError, RunEvent, RunId, RunMode, RunStatus, Step, StepError,
    StepStatus, Usage,
};
use fm_policy::{AdapterFacts, Decision, PolicyDoc, StepEstimate};
use fm_runbook::{RunbookDoc, StepTemplate};
use fm_store::{RunStore, StoreError, DEFAULT_LEASE_TTL_MS};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Deduplication token for one (run, step, args) invocation.
fn idempotency_key(run_id: &RunId, step_name: &str, args: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(run_id.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(step_name.as_bytes());
    hasher.update(b"|");
    hasher.update(canonicalize(args).as_bytes());
    hex::encode(hasher.finalize())
}

/// The durable workflow driver. One instance may drive many runs; each
/// run is guarded by a store lease (single writer per run).
pub struct Executor<C: Clock> {
    store: Arc<dyn RunStore>,
    audit: Arc<AuditLog>,
    registry: Arc<AdapterRegistry>,
    runbooks: Arc<RunbookStore>,
    planner: Arc<dyn Planner>,
    toolcaller: Arc<dyn Toolcaller>,
    reviewer: Arc<dyn Reviewer>,
    approvals: Arc<ApprovalService<C>>,
    telemetry: Arc<dyn TelemetryHook>,
    env: EngineEnv,
    retry: RetryConfig,
    clock: C,
    /// Lease owner identity for this executor instance.
    owner: String,
}

impl<C: Clock> Executor<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn RunStore>,
        audit: Arc<AuditLog>,
        registry: Arc<AdapterRegistry>,
        runbooks: Arc<RunbookStore>,
        planner: Arc<dyn Planner>,
        toolcaller: Arc<dyn Toolcaller>,
        reviewer: Arc<dyn Reviewer>,
        approvals: Arc<ApprovalService<C>>,
        telemetry: Arc<dyn TelemetryHook>,
        env: EngineEnv,
        retry: RetryConfig,
        clock: C,
    ) -> Self {
        let owner = format!("exec-{}", nanoid::nanoid!(8));
        Self {
            store,
            audit,
            registry,
            runbooks,
            planner,
            toolcaller,
            reviewer,
            approvals,
            telemetry,
            env,
            retry,
            clock,
            owner,
        }
    }

    /// Drive one run to a terminal status.
    ///
    /// Re-entrant: a run that is already terminal returns immediately;
    /// a run with checkpointed steps resumes at the first non-terminal
    /// index. Lease loss abandons the run without further mutation.
    pub async fn run(
        &self,
        run_id: RunId,
        cancel: CancellationToken,
    ) -> Result<RunStatus, EngineError> {
        let existing = self
            .store
            .load_run(&run_id)
            .await?
            .ok_or_else(|| EngineError::Validation(format!("unknown run {run_id}")))?;
        if existing.is_terminal() {
            return Ok(existing.status);
        }

        let now = self.clock.epoch_ms();
        let mut lease =
            self.store.acquire_lease(&run_id, &self.owner, DEFAULT_LEASE_TTL_MS, now).await?;

        let result = self.drive(existing, &cancel, &mut lease).await;
        if !matches!(result, Err(EngineError::Store(StoreError::LeaseLost))) {
            let _ = self.store.release_lease(&lease).await;
        }
        result
    }

    async fn drive(
        &self,
        mut run: Run,
        cancel: &CancellationToken,
        lease: &mut fm_store::Lease,
    ) -> Result<RunStatus, EngineError> {
        let run_started_at = self.clock.now();

        let doc = self
            .runbooks
            .get(&run.tenant, &run.runbook_name, &run.runbook_version)
            .ok_or_else(|| {
                EngineError::Validation(format!(
                    "runbook {}@{} not committed",
                    run.runbook_name, run.runbook_version
                ))
            })?;
        let policy: PolicyDoc = serde_json::from_value(run.policy_snapshot.clone())
            .map_err(|e| EngineError::Validation(format!("captured policy unreadable: {e}")))?;

        // DR drills: silently downgrade execute to dry-run, audited
        if self.env.dry_run_forced && run.mode == RunMode::Execute {
            run.mode = RunMode::DryRun;
            self.store.save_run(&run).await?;
            self.audit.append(
                &run.tenant,
                EventDraft::new("system", fm_core::ActorKind::System, "run.downgraded", "run", run.id.as_str())
                    .payload(json!({"from": "execute", "to": "dry_run"})),
                self.clock.epoch_ms(),
            )?;
        }

        if run.status == RunStatus::Pending {
            self.transition(&mut run, RunStatus::Running)?;
            self.store.save_run(&run).await?;
            self.audit.append(
                &run.tenant,
                EventDraft::new(&run.caller.actor, run.caller.kind, "run.started", "run", run.id.as_str())
                    .payload(json!({
                        "runbook": run.runbook_name,
                        "version": run.runbook_version,
                        "mode": run.mode,
                        "policy": format!("{}@{}", run.policy_name, run.policy_version),
                    })),
                self.clock.epoch_ms(),
            )?;
            self.store.publish_event(RunEvent::RunStarted { run_id: run.id, mode: run.mode }).await?;
            self.telemetry.incr(Counter::RunsStarted);
        }

        let context_value = Value::Object(run.context.clone().into_iter().collect());
        let catalog = self.registry.tool_ids();
        let mut rows = self.store.list_steps(&run.id).await?;
        let recorder = IntentRecorder::new();

        // Plan once per (re)start; checkpointed rows keep their captured
        // tool+args, so replanning only affects unmaterialized steps.
        let (planned, planner_usage) =
            self.plan_if_needed(&doc, &context_value, &catalog, &rows).await?;
        let planned_by_name: HashMap<&str, &PlannedStep> =
            planned.iter().map(|p| (p.name.as_str(), p)).collect();
        // planner tokens accrue to the first step it planned, so the run
        // totals stay equal to the sum over step usage records
        let mut planner_usage = Some(planner_usage);

        let mut failure: Option<RunError> = None;

        for index in 0..doc.steps.len() as u32 {
            // safe point: cancellation, lease, run deadline
            if cancel.is_cancelled() {
                return self.finish_run(&mut run, RunStatus::Cancelled, None, run_started_at).await;
            }
            *lease = self.store.renew_lease(lease, self.clock.epoch_ms()).await?;
            if let Some(deadline) = run.deadline_ms {
                if self.clock.epoch_ms() >= deadline {
                    failure = Some(
                        RunError::new(ErrorCode::Policy, "run deadline exceeded").at_step(index),
                    );
                    break;
                }
            }

            let template = &doc.steps[index as usize];
            let existing = rows
                .iter()
                .find(|s| s.index == index && s.compensates_step_index.is_none())
                .cloned();

            // idempotent resume: terminal rows are never re-executed
            if let Some(row) = &existing {
                if row.status.is_terminal() {
                    if row.status == StepStatus::Failed && !template.continue_on_error {
                        failure = Some(step_failure(row));
                        break;
                    }
                    if row.status == StepStatus::Blocked {
                        failure = Some(step_failure(row));
                        break;
                    }
                    continue;
                }
            }

            // one span covers gate + invoke + record for this step
            let step_span =
                tracing::info_span!("step", run = %run.id, index, name = %template.name);

            // reconcile an invocation interrupted by a crash
            if let Some(row) = existing.clone() {
                if row.status == StepStatus::Running && row.attempts > 0 {
                    if let Some(outcome) = self.reconcile(&mut run, row).await? {
                        rows = self.store.list_steps(&run.id).await?;
                        if outcome == StepStatus::Failed && !template.continue_on_error {
                            let row = rows
                                .iter()
                                .find(|s| s.index == index && s.compensates_step_index.is_none())
                                .cloned();
                            if let Some(row) = row {
                                self.compensate(&mut run, &rows).await;
                                failure = Some(step_failure(&row));
                            }
                            break;
                        }
                        continue;
                    }
                    // fall through: idempotent adapter, safe to retry
                }
            }

            // materialize
            let mut step = existing.unwrap_or_else(|| {
                Step::pending(run.id, index, &template.name, "", json!({}))
            });
            if let Some(usage) = planner_usage.take() {
                step.usage.absorb(&usage);
            }

            // plan-or-pass
            if step.tool.is_empty() {
                match self.resolve_call(&mut step, template, &planned_by_name, &context_value, &catalog).await {
                    Ok(()) => {}
                    Err(EngineError::Agent(e)) => {
                        let code = match &e {
                            AgentError::Malformed(_) => ErrorCode::AgentMalformed,
                            AgentError::Transport(_) => ErrorCode::AdapterTransient,
                        };
                        step.fail(StepError::new(code, e.to_string()), self.clock.epoch_ms());
                        self.record_step(&mut run, &step, "step.failed").await?;
                        if !template.continue_on_error {
                            failure = Some(step_failure(&step));
                        }
                        rows = self.store.list_steps(&run.id).await?;
                        if failure.is_some() {
                            break;
                        }
                        continue;
                    }
                    Err(other) => return Err(other),
                }
                self.store.save_step(&step).await?;
                self.store
                    .publish_event(RunEvent::StepStarted {
                        run_id: run.id,
                        index,
                        name: step.name.clone(),
                        tool: step.tool.clone(),
                    })
                    .await?;
            }

            // review
            let facts = self.adapter_facts(&step);
            let estimate = self.step_estimate(&step, template, run.mode);
            let request = ReviewRequest {
                tool: &step.tool,
                args: &step.args,
                subject: &run.caller,
                policy: &policy,
                context: &context_value,
                totals: &run.metrics,
                estimate: &estimate,
                facts: &facts,
                default_action: self.env.default_action,
            };
            let review = match self.reviewer.review(&request).instrument(step_span.clone()).await {
                Ok((review, usage)) => {
                    step.usage.absorb(&usage);
                    review
                }
                Err(e) => {
                    let code = match &e {
                        AgentError::Malformed(_) => ErrorCode::AgentMalformed,
                        AgentError::Transport(_) => ErrorCode::AdapterTransient,
                    };
                    step.fail(StepError::new(code, e.to_string()), self.clock.epoch_ms());
                    self.record_step(&mut run, &step, "step.failed").await?;
                    if !template.continue_on_error {
                        failure = Some(step_failure(&step));
                        break;
                    }
                    rows = self.store.list_steps(&run.id).await?;
                    continue;
                }
            };
            if let Some(disagreement) = review.disagreement {
                self.audit.append(
                    &run.tenant,
                    EventDraft::new("system", fm_core::ActorKind::System, "review.disagreement", "step", step.id.as_str())
                        .payload(json!({
                            "run": run.id.as_str(),
                            "step_index": index,
                            "llm": disagreement.llm.to_string(),
                            "policy": disagreement.policy.to_string(),
                        })),
                    self.clock.epoch_ms(),
                )?;
            }

            // gate: the reviewer's verdict is the only authorization for
            // an adapter invocation
            match review.verdict.decision {
                Decision::Block => {
                    self.telemetry.incr(Counter::PolicyBlocks);
                    let reasons = review.verdict.reasons.clone();
                    let reason =
                        reasons.first().cloned().unwrap_or_else(|| "blocked".to_string());
                    step.error = Some(StepError::new(ErrorCode::Policy, reason.clone()));
                    if template.continue_on_error {
                        step.finish(StepStatus::Skipped, self.clock.epoch_ms());
                        self.record_step_with(&mut run, &step, "step.skipped", json!({"reasons": reasons}))
                            .await?;
                        rows = self.store.list_steps(&run.id).await?;
                        continue;
                    }
                    step.finish(StepStatus::Blocked, self.clock.epoch_ms());
                    self.record_step_with(&mut run, &step, "step.blocked", json!({"reasons": reasons}))
                        .await?;
                    failure = Some(RunError::new(ErrorCode::Policy, reason).at_step(index));
                    break;
                }
                Decision::RequireApproval => {
                    // a prior incarnation may already hold the decision
                    let prior = self
                        .store
                        .list_approvals(&run.id)
                        .await?
                        .into_iter()
                        .filter(|a| a.step_index == index && a.is_resolved())
                        .last();
                    let state = if let Some(prior) = prior {
                        prior.state
                    } else {
                        self.telemetry.incr(Counter::ApprovalsRequested);
                        let approval = self
                            .approvals
                            .request(
                                &run,
                                index,
                                review.verdict.reasons.join(","),
                                review.verdict.approval_rule.as_ref(),
                            )
                            .await?;
                        // a crashed executor resumes here already awaiting
                        if run.status != RunStatus::AwaitingApproval {
                            self.transition(&mut run, RunStatus::AwaitingApproval)?;
                            self.store.save_run(&run).await?;
                        }

                        tokio::select! {
                            state = self.approvals.wait(&approval.id, &run.tenant) => state?,
                            () = cancel.cancelled() => {
                                return self
                                    .finish_run(&mut run, RunStatus::Cancelled, None, run_started_at)
                                    .await;
                            }
                        }
                    };
                    if state.permits_invocation() {
                        self.transition(&mut run, RunStatus::Running)?;
                        self.store.save_run(&run).await?;
                    } else {
                        // denied and expired read the same to the gate
                        let reason = format!("approval_{state}");
                        step.error = Some(StepError::new(ErrorCode::Policy, reason.clone()));
                        step.finish(StepStatus::Blocked, self.clock.epoch_ms());
                        self.record_step(&mut run, &step, "step.blocked").await?;
                        failure = Some(RunError::new(ErrorCode::Policy, reason).at_step(index));
                        break;
                    }
                }
                Decision::Allow => {}
            }

            // mode check: dry-run records intent and synthesizes output
            if run.mode == RunMode::DryRun {
                step.output = Some(json!({
                    "would_invoke": step.tool,
                    "args": step.args,
                    "dry_run": true,
                }));
                step.finish(StepStatus::Succeeded, self.clock.epoch_ms());
                self.record_step(&mut run, &step, "step.would_invoke").await?;
                rows = self.store.list_steps(&run.id).await?;
                continue;
            }

            // invoke with retry on transient/timeout only
            let cancelled_mid_retry = self
                .invoke_with_retry(&mut run, &mut step, template, &recorder, cancel)
                .instrument(step_span.clone())
                .await?;

            let action = match step.status {
                StepStatus::Succeeded => "step.succeeded",
                _ => "step.failed",
            };
            self.record_step(&mut run, &step, action).instrument(step_span).await?;
            rows = self.store.list_steps(&run.id).await?;

            if cancelled_mid_retry {
                return self.finish_run(&mut run, RunStatus::Cancelled, None, run_started_at).await;
            }

            if step.status == StepStatus::Failed {
                if template.continue_on_error {
                    continue;
                }
                self.compensate(&mut run, &rows).await;
                failure = Some(step_failure(&step));
                break;
            }
        }

        if let Some(error) = failure {
            return self
                .finish_run(&mut run, RunStatus::Failed, Some(error), run_started_at)
                .await;
        }

        if run.mode == RunMode::Shadow {
            let reference = doc.reference_steps();
            let intents = recorder.intents();
            let report = shadow::compare(&intents, &reference);
            for intent in &intents {
                if !reference.iter().any(|r| r.tool == intent.tool) {
                    self.telemetry.incr(Counter::Hallucinations);
                }
            }
            run.shadow = Some(report.to_value());
            self.audit.append(
                &run.tenant,
                EventDraft::new("system", fm_core::ActorKind::System, "shadow.scored", "run", run.id.as_str())
                    .payload(report.to_value()),
                self.clock.epoch_ms(),
            )?;
        }

        self.finish_run(&mut run, RunStatus::Succeeded, None, run_started_at).await
    }

    /// Run the planner unless every remaining template already has a
    /// terminal checkpoint. The returned usage is attributed to the first
    /// step the caller materializes.
    async fn plan_if_needed(
        &self,
        doc: &RunbookDoc,
        context: &Value,
        catalog: &[String],
        rows: &[Step],
    ) -> Result<(Vec<PlannedStep>, Usage), EngineError> {
        let all_terminal = !doc.steps.is_empty()
            && (0..doc.steps.len() as u32).all(|i| {
                rows.iter()
                    .any(|s| s.index == i && s.compensates_step_index.is_none() && s.status.is_terminal())
            });
        if doc.steps.is_empty() || all_terminal {
            return Ok((Vec::new(), Usage::default()));
        }
        self.planner.plan(doc, context, catalog).await.map_err(EngineError::Agent)
    }

    /// Plan-or-pass: concrete planner output is used verbatim; loose
    /// steps go through the toolcaller.
    async fn resolve_call(
        &self,
        step: &mut Step,
        template: &StepTemplate,
        planned_by_name: &HashMap<&str, &PlannedStep>,
        context: &Value,
        catalog: &[String],
    ) -> Result<(), EngineError> {
        if let Some(planned) = planned_by_name.get(template.name.as_str()) {
            if let Some(tool) = planned.tool.clone().filter(|t| !t.is_empty()) {
                step.tool = tool;
                step.args = planned.args.clone();
                return Ok(());
            }
        }
        let (call, usage) = self
            .toolcaller
            .call(template, context, catalog)
            .await
            .map_err(EngineError::Agent)?;
        step.usage.absorb(&usage);
        step.tool = call.tool;
        step.args = call.args;
        tracing::debug!(
            tool = %step.tool,
            confidence = call.confidence,
            rationale = %call.rationale,
            "toolcaller refined step"
        );
        Ok(())
    }

    /// Bounded upper estimate of what the pending step would add to the
    /// run totals: agent usage already accrued to the step (not yet in
    /// the totals) plus the worst-case invocation wall clock across
    /// retries. Budget caps gate on totals + this estimate, so a step
    /// that cannot fit the remaining budget is blocked before it runs.
    fn step_estimate(&self, step: &Step, template: &StepTemplate, mode: RunMode) -> StepEstimate {
        let spec_budget = self.registry.get(&step.tool).map(|a| a.spec().timeout_ms);
        let invoke_budget_ms = match (spec_budget, template.timeout_ms) {
            (Some(spec), Some(step_budget)) => spec.min(step_budget),
            (Some(spec), None) => spec,
            (None, step_budget) => step_budget.unwrap_or(0),
        };
        let wall_ms = if mode.invokes_adapters() {
            invoke_budget_ms * self.retry.max_attempts as u64
        } else {
            0
        };
        StepEstimate {
            tokens: step.usage.tokens_in + step.usage.tokens_out,
            cost_usd: step.usage.cost_usd,
            wall_ms,
        }
    }

    fn adapter_facts(&self, step: &Step) -> AdapterFacts {
        match self.registry.get(&step.tool) {
            Some(adapter) => {
                let spec = adapter.spec();
                AdapterFacts {
                    schema_violation: fm_adapters::validate_args(&spec.schema, &step.args)
                        .err()
                        .map(|v| v.pointer),
                    destructive: spec.classification == Classification::Destructive,
                }
            }
            None => AdapterFacts::default(),
        }
    }

    /// Invoke the adapter, retrying only transient/timeout failures with
    /// exponential backoff and jitter. Returns true when cancellation
    /// was observed between attempts (the in-flight result is already
    /// recorded on the step).
    async fn invoke_with_retry(
        &self,
        run: &mut Run,
        step: &mut Step,
        template: &StepTemplate,
        recorder: &IntentRecorder,
        cancel: &CancellationToken,
    ) -> Result<bool, EngineError> {
        let adapter = self.registry.get(&step.tool);
        let idempotent = adapter.as_ref().map(|a| a.spec().idempotent).unwrap_or(false);

        step.start(self.clock.epoch_ms());
        if !idempotent && step.idempotency_key.is_none() {
            step.idempotency_key = Some(idempotency_key(&run.id, &step.name, &step.args));
        }
        // intent checkpoint before the side effect
        self.store.save_step(step).await?;

        let ctx = InvokeCtx {
            tenant: run.tenant.clone(),
            run_id: run.id.to_string(),
            idempotency_key: step.idempotency_key.clone(),
        };

        loop {
            step.attempts += 1;
            self.store.save_step(step).await?;
            self.telemetry.incr(Counter::AdapterCalls);

            // forced interruption is only permitted for reads that are
            // declared safe to interrupt; everything else completes and
            // has its result recorded first
            let interruptible = adapter.as_ref().is_some_and(|a| {
                let spec = a.spec();
                spec.classification == Classification::Read && spec.safe_to_interrupt
            });
            if interruptible && run.mode != RunMode::Shadow {
                tokio::select! {
                    result = self.registry.invoke(&step.tool, &step.args, &ctx) => {
                        match result {
                            Ok(invocation) => {
                                step.usage.absorb(&invocation.usage);
                                step.output = Some(invocation.output);
                                step.finish(StepStatus::Succeeded, self.clock.epoch_ms());
                                return Ok(false);
                            }
                            Err(e) if e.kind.is_retryable()
                                && step.attempts < self.retry.max_attempts => {
                                tokio::time::sleep(
                                    self.retry.delay_for_attempt(step.attempts + 1),
                                )
                                .await;
                                continue;
                            }
                            Err(e) => {
                                step.fail(
                                    StepError::new(adapter_code(e.kind), e.message),
                                    self.clock.epoch_ms(),
                                );
                                return Ok(false);
                            }
                        }
                    }
                    () = cancel.cancelled() => {
                        step.fail(
                            StepError::new(ErrorCode::AdapterTimeout, "interrupted by cancellation"),
                            self.clock.epoch_ms(),
                        );
                        return Ok(true);
                    }
                }
            }

            let result = if run.mode == RunMode::Shadow {
                Ok(recorder.record(&step.tool, &step.args))
            } else if let Some(step_budget) = template.timeout_ms {
                // per-step budget tightens (never widens) the adapter's own
                match tokio::time::timeout(
                    std::time::Duration::from_millis(step_budget),
                    self.registry.invoke(&step.tool, &step.args, &ctx),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(fm_adapters::AdapterError::timeout(format!(
                        "step budget {step_budget}ms exceeded"
                    ))),
                }
            } else {
                self.registry.invoke(&step.tool, &step.args, &ctx).await
            };

            match result {
                Ok(invocation) => {
                    step.usage.absorb(&invocation.usage);
                    step.output = Some(invocation.output);
                    step.finish(StepStatus::Succeeded, self.clock.epoch_ms());
                    return Ok(false);
                }
                Err(e) if e.kind.is_retryable() && step.attempts < self.retry.max_attempts => {
                    let delay = self.retry.delay_for_attempt(step.attempts + 1);
                    tracing::warn!(
                        tool = %step.tool,
                        attempt = step.attempts,
                        delay_ms = delay.as_millis() as u64,
                        kind = %e.kind,
                        "retrying after transient adapter failure"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => {
                            // the completed attempt's failure is recorded
                            step.fail(
                                StepError::new(adapter_code(e.kind), e.message),
                                self.clock.epoch_ms(),
                            );
                            return Ok(true);
                        }
                    }
                }
                Err(e) => {
                    step.fail(
                        StepError::new(adapter_code(e.kind), e.message),
                        self.clock.epoch_ms(),
                    );
                    return Ok(false);
                }
            }
        }
    }

    /// Resolve a step whose invocation was interrupted by a crash.
    ///
    /// Idempotent adapters return `None` (caller simply re-invokes).
    /// Non-idempotent adapters are reconciled through their idempotency
    /// API when they offer one; otherwise the outcome is unknown and the
    /// step is failed without retry.
    async fn reconcile(
        &self,
        run: &mut Run,
        mut row: Step,
    ) -> Result<Option<StepStatus>, EngineError> {
        let Some(adapter) = self.registry.get(&row.tool) else {
            return Ok(None);
        };
        if adapter.spec().idempotent {
            return Ok(None);
        }

        let looked_up = match &row.idempotency_key {
            Some(key) => adapter.lookup(key).await,
            None => None,
        };
        match looked_up {
            Some(invocation) => {
                tracing::info!(run = %run.id, index = row.index, "recovered interrupted invocation");
                row.usage.absorb(&invocation.usage);
                row.output = Some(invocation.output);
                row.finish(StepStatus::Succeeded, self.clock.epoch_ms());
                self.record_step(run, &row, "step.succeeded").await?;
                Ok(Some(StepStatus::Succeeded))
            }
            None => {
                tracing::warn!(
                    run = %run.id,
                    index = row.index,
                    "interrupted non-idempotent invocation, outcome unknown"
                );
                row.fail(
                    StepError::new(
                        ErrorCode::AdapterPermanent,
                        "outcome unknown after restart; refusing to retry non-idempotent call",
                    ),
                    self.clock.epoch_ms(),
                );
                self.record_step(run, &row, "step.failed").await?;
                Ok(Some(StepStatus::Failed))
            }
        }
    }

    /// Walk succeeded side-effecting steps in reverse, invoking declared
    /// inverses. Best-effort: failures are logged, never cascaded.
    async fn compensate(&self, run: &mut Run, rows: &[Step]) {
        let mut next_index = rows.iter().map(|s| s.index + 1).max().unwrap_or(0);
        let candidates: Vec<&Step> = rows
            .iter()
            .filter(|s| s.compensates_step_index.is_none() && s.status == StepStatus::Succeeded)
            .collect();

        for original in candidates.iter().rev() {
            let Some(adapter) = self.registry.get(&original.tool) else { continue };
            let spec = adapter.spec();
            if !spec.classification.has_side_effects() {
                continue;
            }
            let Some(inverse_tool) = spec.compensation.clone() else { continue };
            let Some(inverse) = self.registry.get(&inverse_tool) else { continue };

            let args = inverse_args(&inverse.spec().schema, original);
            let mut comp = Step::pending(
                run.id,
                next_index,
                format!("compensate-{}", original.name),
                inverse_tool.clone(),
                args.clone(),
            );
            comp.compensates_step_index = Some(original.index);
            comp.start(self.clock.epoch_ms());
            next_index += 1;

            let ctx = InvokeCtx {
                tenant: run.tenant.clone(),
                run_id: run.id.to_string(),
                idempotency_key: Some(format!(
                    "{}-comp",
                    original.idempotency_key.clone().unwrap_or_else(|| {
                        idempotency_key(&run.id, &original.name, &original.args)
                    })
                )),
            };
            // one attempt, no retries
            match self.registry.invoke(&inverse_tool, &args, &ctx).await {
                Ok(invocation) => {
                    comp.usage.absorb(&invocation.usage);
                    comp.output = Some(invocation.output);
                    comp.finish(StepStatus::Compensated, self.clock.epoch_ms());
                    if let Err(e) = self.record_step(run, &comp, "step.compensated").await {
                        tracing::error!(error = %e, "failed to record compensation");
                    }
                }
                Err(e) => {
                    tracing::error!(
                        run = %run.id,
                        tool = %inverse_tool,
                        error = %e,
                        "compensation failed"
                    );
                    comp.fail(
                        StepError::new(adapter_code(e.kind), e.message),
                        self.clock.epoch_ms(),
                    );
                    if let Err(e) = self.record_step(run, &comp, "step.compensation_failed").await {
                        tracing::error!(error = %e, "failed to record compensation failure");
                    }
                }
            }
        }
    }

    fn transition(&self, run: &mut Run, to: RunStatus) -> Result<(), EngineError> {
        run.transition(to, self.clock.epoch_ms())
            .map_err(|e| EngineError::Internal(e.to_string()))
    }

    async fn finish_run(
        &self,
        run: &mut Run,
        status: RunStatus,
        error: Option<RunError>,
        started_at: std::time::Instant,
    ) -> Result<RunStatus, EngineError> {
        run.error = error;
        self.transition(run, status)?;
        self.store.save_run(run).await?;

        let action = match status {
            RunStatus::Succeeded => "run.succeeded",
            RunStatus::Cancelled => "run.cancelled",
            _ => "run.failed",
        };
        let payload = match &run.error {
            Some(error) => json!({
                "code": error.code,
                "reason": error.reason,
                "step_index": error.step_index,
                "metrics": run.metrics,
            }),
            None => json!({"metrics": run.metrics}),
        };
        self.audit.append(
            &run.tenant,
            EventDraft::new(&run.caller.actor, run.caller.kind, action, "run", run.id.as_str())
                .payload(payload),
            self.clock.epoch_ms(),
        )?;
        self.store.publish_event(RunEvent::RunTerminated { run_id: run.id, status }).await?;
        self.telemetry
            .observe(Histogram::RunLatencyMs, started_at.elapsed().as_millis() as f64);
        tracing::info!(run = %run.id, %status, "run terminated");
        Ok(status)
    }

    /// Persist a terminal step, append its audit event, fold usage into
    /// the run totals, and publish the stream event.
    async fn record_step(
        &self,
        run: &mut Run,
        step: &Step,
        action: &str,
    ) -> Result<(), EngineError> {
        self.record_step_with(run, step, action, Value::Null).await
    }

    async fn record_step_with(
        &self,
        run: &mut Run,
        step: &Step,
        action: &str,
        extra: Value,
    ) -> Result<(), EngineError> {
        self.save_step_retrying(step).await?;

        let mut payload = json!({
            "run": run.id.as_str(),
            "step_index": step.index,
            "name": step.name,
            "tool": step.tool,
            "args": step.args,
            "status": step.status,
            "attempts": step.attempts,
            "usage": step.usage,
        });
        if let Some(output) = &step.output {
            payload["output"] = output.clone();
        }
        if let Some(error) = &step.error {
            payload["error"] = json!({"code": error.code, "reason": error.reason});
        }
        if let Some(compensates) = step.compensates_step_index {
            payload["compensates_step_index"] = json!(compensates);
        }
        if let Value::Object(extra) = extra {
            for (key, value) in extra {
                payload[key] = value;
            }
        }

        let secret_keys = self
            .registry
            .get(&step.tool)
            .map(|a| fm_adapters::secret_keys(&a.spec().schema))
            .unwrap_or_default();
        // an unlogged side effect must not be proceeded past
        self.audit.append_with_secret_keys(
            &run.tenant,
            EventDraft::new(&run.caller.actor, run.caller.kind, action, "step", step.id.as_str())
                .payload(payload),
            self.clock.epoch_ms(),
            &secret_keys,
        )?;

        run.metrics.absorb(&step.usage);
        self.store.save_run(run).await?;
        self.store
            .publish_event(RunEvent::StepFinished {
                run_id: run.id,
                index: step.index,
                name: step.name.clone(),
                status: step.status,
                reason: step.error.as_ref().map(|e| e.reason.clone()),
            })
            .await?;

        self.telemetry.incr(Counter::StepsExecuted);
        self.telemetry.observe(Histogram::StepLatencyMs, step.usage.wall_ms as f64);
        self.telemetry.observe(Histogram::TokenCostUsd, step.usage.cost_usd);
        Ok(())
    }

    /// Store writes pause with backoff before failing the run; audit
    /// events already appended stay valid.
    async fn save_step_retrying(&self, step: &Step) -> Result<(), EngineError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.save_step(step).await {
                Ok(()) => return Ok(()),
                Err(StoreError::LeaseLost) => return Err(StoreError::LeaseLost.into()),
                Err(e) if attempt < 3 => {
                    tracing::warn!(error = %e, attempt, "store write failed, backing off");
                    tokio::time::sleep(self.retry.delay_for_attempt(attempt + 1)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn adapter_code(kind: AdapterErrorKind) -> ErrorCode {
    match kind {
        AdapterErrorKind::Transient => ErrorCode::AdapterTransient,
        AdapterErrorKind::Timeout => ErrorCode::AdapterTimeout,
        AdapterErrorKind::ValidationFailed => ErrorCode::Validation,
        AdapterErrorKind::PreconditionFailed
        | AdapterErrorKind::Permanent
        | AdapterErrorKind::Unauthorized => ErrorCode::AdapterPermanent,
    }
}

fn step_failure(step: &Step) -> RunError {
    let (code, reason) = match &step.error {
        Some(error) => (error.code, error.reason.clone()),
        None => (ErrorCode::Internal, format!("step {} {}", step.index, step.status)),
    };
    RunError { code, reason, step_index: Some(step.index) }
}

/// Compensation argument synthesis: original args merged with original
/// output, projected onto the inverse schema's declared properties.
fn inverse_args(inverse_schema: &Value, original: &Step) -> Value {
    let mut merged = serde_json::Map::new();
    if let Value::Object(args) = &original.args {
        for (k, v) in args {
            merged.insert(k.clone(), v.clone());
        }
    }
    if let Some(Value::Object(output)) = &original.output {
        for (k, v) in output {
            merged.insert(k.clone(), v.clone());
        }
    }
    let Some(properties) = inverse_schema.get("properties").and_then(Value::as_object) else {
        return Value::Object(merged);
    };
    let projected: serde_json::Map<String, Value> = merged
        .into_iter()
        .filter(|(k, _)| properties.contains_key(k))
        .collect();
    Value::Object(projected)
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
