// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Approval rendezvous: suspend a run awaiting a human decision, then
//! resume it.

use crate::error::EngineError;
use fm_audit::{redacted_digest, AuditLog, EventDraft};
use fm_core::{
    Approval, ApprovalId, ApprovalState, ApprovalToken, Clock, Run, RunEvent, Subject,
};
use fm_policy::ApprovalRule;
use fm_store::RunStore;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Fallback expiry when no approval rule names one.
const DEFAULT_EXPIRY_SECONDS: u64 = 3600;

/// Creates approval tokens, parks waiting executors, and records every
/// decision into the audit chain.
pub struct ApprovalService<C: Clock> {
    store: Arc<dyn RunStore>,
    audit: Arc<AuditLog>,
    clock: C,
    /// Keyed HMAC salt for approval tokens.
    salt: String,
    /// Wakes the executor parked in [`wait`](Self::wait).
    waiters: Mutex<HashMap<ApprovalId, watch::Sender<u64>>>,
    /// Serializes decide/expire so racing deciders see a conflict.
    decide_lock: tokio::sync::Mutex<()>,
}

impl<C: Clock> ApprovalService<C> {
    pub fn new(store: Arc<dyn RunStore>, audit: Arc<AuditLog>, clock: C, salt: &str) -> Self {
        Self {
            store,
            audit,
            clock,
            salt: salt.to_string(),
            waiters: Mutex::new(HashMap::new()),
            decide_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn waiter(&self, id: ApprovalId) -> watch::Receiver<u64> {
        let mut waiters = self.waiters.lock();
        waiters.entry(id).or_insert_with(|| watch::channel(0).0).subscribe()
    }

    fn wake(&self, id: ApprovalId) {
        if let Some(tx) = self.waiters.lock().get(&id) {
            tx.send_modify(|n| *n += 1);
        }
    }

    /// Create a pending approval for (run, step). An existing pending
    /// approval for the pair is reused, preserving the at-most-one
    /// non-terminal invariant across executor restarts.
    pub async fn request(
        &self,
        run: &Run,
        step_index: u32,
        reason: String,
        rule: Option<&ApprovalRule>,
    ) -> Result<Approval, EngineError> {
        for existing in self.store.list_approvals(&run.id).await? {
            if existing.step_index == step_index && !existing.is_resolved() {
                return Ok(existing);
            }
        }

        let now = self.clock.epoch_ms();
        let expiry_seconds = rule.map(|r| r.expiry_seconds).unwrap_or(DEFAULT_EXPIRY_SECONDS);
        let expiry_at_ms = now + expiry_seconds * 1000;
        let id = ApprovalId::new();

        let nonce = nanoid::nanoid!(16);
        let sig = redacted_digest(
            &self.salt,
            &json!({"approval": id.as_str(), "nonce": nonce, "expires_at_ms": expiry_at_ms}),
        );
        let approval = Approval {
            id,
            run_id: run.id,
            step_index,
            requested_by: run.caller.actor.clone(),
            reason: reason.clone(),
            state: ApprovalState::Pending,
            required_roles: rule.map(|r| r.requires_roles.clone()).unwrap_or_default(),
            allow_self: rule.map(|r| r.allow_self).unwrap_or(false),
            decider: None,
            decided_at_ms: None,
            comment: None,
            created_at_ms: now,
            expiry_at_ms,
            token: Some(ApprovalToken { nonce, sig, expires_at_ms: expiry_at_ms }),
        };

        self.store.save_approval(&approval).await?;
        self.audit.append(
            &run.tenant,
            EventDraft::new(
                &run.caller.actor,
                run.caller.kind,
                "approval.requested",
                "approval",
                id.as_str(),
            )
            .payload(json!({
                "run": run.id.as_str(),
                "step_index": step_index,
                "reason": reason,
                "expiry_at_ms": expiry_at_ms,
            })),
            now,
        )?;
        self.store
            .publish_event(RunEvent::ApprovalRequested { run_id: run.id, index: step_index, approval_id: id })
            .await?;
        tracing::info!(run = %run.id, step_index, approval = %id, "approval requested");
        Ok(approval)
    }

    /// Record a human decision. Exactly one of two concurrent calls
    /// succeeds; the loser observes a conflict.
    pub async fn decide(
        &self,
        approval_id: &ApprovalId,
        decider: &Subject,
        approve: bool,
        comment: Option<String>,
    ) -> Result<Approval, EngineError> {
        let _guard = self.decide_lock.lock().await;

        let mut approval = self
            .store
            .load_approval(approval_id)
            .await?
            .ok_or_else(|| EngineError::Validation(format!("unknown approval {approval_id}")))?;

        if approval.is_resolved() {
            return Err(EngineError::Concurrency(format!(
                "approval {approval_id} already {}",
                approval.state
            )));
        }

        let run = self
            .store
            .load_run(&approval.run_id)
            .await?
            .ok_or_else(|| EngineError::Internal(format!("approval {approval_id} orphaned")))?;
        if run.tenant != decider.tenant {
            return Err(EngineError::Validation("approval belongs to another tenant".into()));
        }

        let now = self.clock.epoch_ms();
        if approval.is_past_expiry(now) {
            self.expire_locked(&mut approval, decider, now).await?;
            return Err(EngineError::Policy(format!("approval {approval_id} expired")));
        }

        // four-eyes rule, unless the matching rule opted out
        if !approval.allow_self && decider.actor == approval.requested_by {
            return Err(EngineError::Validation(
                "decider must be a distinct subject from the run caller".into(),
            ));
        }
        if !approval.required_roles.is_empty()
            && !approval.required_roles.iter().any(|role| decider.has_role(role))
        {
            return Err(EngineError::Validation(format!(
                "decider lacks required roles {:?}",
                approval.required_roles
            )));
        }

        let state = if approve { ApprovalState::Approved } else { ApprovalState::Denied };
        approval.resolve(state, &decider.actor, comment.clone(), now);
        self.store.save_approval(&approval).await?;

        let action =
            if approve { "approval.approved" } else { "approval.denied" };
        self.audit.append(
            &run.tenant,
            EventDraft::new(&decider.actor, decider.kind, action, "approval", approval_id.as_str())
                .payload(json!({
                    "run": approval.run_id.as_str(),
                    "step_index": approval.step_index,
                    "comment": comment,
                })),
            now,
        )?;
        self.store
            .publish_event(RunEvent::ApprovalResolved {
                run_id: approval.run_id,
                index: approval.step_index,
                approval_id: *approval_id,
                state,
            })
            .await?;
        tracing::info!(approval = %approval_id, decider = %decider.actor, %state, "approval decided");
        self.wake(*approval_id);
        Ok(approval)
    }

    /// Block until the approval resolves or its expiry passes. Expiry at
    /// or after the deadline resolves `Expired`, which the executor
    /// treats as denied.
    pub async fn wait(&self, approval_id: &ApprovalId, tenant: &str) -> Result<ApprovalState, EngineError> {
        let mut rx = self.waiter(*approval_id);
        loop {
            let approval = self
                .store
                .load_approval(approval_id)
                .await?
                .ok_or_else(|| EngineError::Validation(format!("unknown approval {approval_id}")))?;
            if approval.is_resolved() {
                return Ok(approval.state);
            }

            let now = self.clock.epoch_ms();
            if approval.is_past_expiry(now) {
                return self.expire(approval_id, tenant).await;
            }

            let remaining = Duration::from_millis(approval.expiry_at_ms - now);
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Err(EngineError::Internal("approval waiter dropped".into()));
                    }
                }
                () = tokio::time::sleep(remaining) => {
                    return self.expire(approval_id, tenant).await;
                }
            }
        }
    }

    /// Expire a pending approval whose deadline has passed.
    async fn expire(&self, approval_id: &ApprovalId, tenant: &str) -> Result<ApprovalState, EngineError> {
        let _guard = self.decide_lock.lock().await;
        let mut approval = self
            .store
            .load_approval(approval_id)
            .await?
            .ok_or_else(|| EngineError::Validation(format!("unknown approval {approval_id}")))?;
        if approval.is_resolved() {
            return Ok(approval.state);
        }
        let system = Subject::system(tenant);
        let now = self.clock.epoch_ms();
        self.expire_locked(&mut approval, &system, now).await?;
        Ok(ApprovalState::Expired)
    }

    async fn expire_locked(
        &self,
        approval: &mut Approval,
        actor: &Subject,
        now: u64,
    ) -> Result<(), EngineError> {
        approval.resolve(ApprovalState::Expired, "system", None, now);
        self.store.save_approval(approval).await?;
        self.audit.append(
            &actor.tenant,
            EventDraft::new("system", fm_core::ActorKind::System, "approval.expired", "approval", approval.id.as_str())
                .payload(json!({
                    "run": approval.run_id.as_str(),
                    "step_index": approval.step_index,
                })),
            now,
        )?;
        self.store
            .publish_event(RunEvent::ApprovalResolved {
                run_id: approval.run_id,
                index: approval.step_index,
                approval_id: approval.id,
                state: ApprovalState::Expired,
            })
            .await?;
        tracing::info!(approval = %approval.id, "approval expired");
        self.wake(approval.id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "approval_tests.rs"]
mod tests;
