// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller identity carried through every run.

use serde::{Deserialize, Serialize};

/// What kind of principal performed an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    User,
    System,
    Api,
}

crate::simple_display! {
    ActorKind {
        User => "user",
        System => "system",
        Api => "api",
    }
}

/// The identity a run executes on behalf of.
///
/// Roles drive the policy allowlist lookup; the tenant scopes the audit
/// chain; the actor string is recorded verbatim on every audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub tenant: String,
    pub actor: String,
    pub kind: ActorKind,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Subject {
    pub fn new(tenant: impl Into<String>, actor: impl Into<String>, kind: ActorKind) -> Self {
        Self { tenant: tenant.into(), actor: actor.into(), kind, roles: Vec::new() }
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Convenience for the background actor used by expiry sweeps and
    /// restart reconciliation.
    pub fn system(tenant: impl Into<String>) -> Self {
        Self::new(tenant, "system", ActorKind::System)
    }
}

#[cfg(test)]
#[path = "subject_tests.rs"]
mod tests;
