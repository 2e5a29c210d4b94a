// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-driven engine configuration.

use fm_policy::DefaultAction;

/// The env surface the core consumes.
#[derive(Debug, Clone, Default)]
pub struct EngineEnv {
    /// `POLICY_DEFAULT_ACTION`: what happens to tools unknown to every
    /// policy rule. Defaults to block.
    pub default_action: DefaultAction,
    /// `DRY_RUN_FORCED`: when set, execute runs are silently downgraded
    /// to dry-run (DR drills). Downgrades are audit-logged.
    pub dry_run_forced: bool,
}

impl EngineEnv {
    pub fn from_env() -> Self {
        let default_action = std::env::var("POLICY_DEFAULT_ACTION")
            .ok()
            .and_then(|v| DefaultAction::parse(&v))
            .unwrap_or_default();
        let dry_run_forced = std::env::var("DRY_RUN_FORCED")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self { default_action, dry_run_forced }
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
