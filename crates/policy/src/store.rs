// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned policy store with atomic activation.

use crate::document::{PolicyDoc, PolicyError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct TenantPolicies {
    /// Every version ever activated, retained for audit.
    versions: Vec<Arc<PolicyDoc>>,
    /// Index into `versions` of the active policy.
    active: Option<usize>,
}

/// Process-wide policy store. Read-mostly: activation swaps a pointer, so
/// in-flight runs keep the snapshot they captured at start.
#[derive(Default)]
pub struct PolicyStore {
    tenants: RwLock<HashMap<String, TenantPolicies>>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register and activate a policy version for a tenant in one step.
    ///
    /// The new version becomes visible to subsequent run starts only.
    pub fn activate(&self, tenant: &str, doc: PolicyDoc) -> Result<(), PolicyError> {
        if doc.version.trim().is_empty() {
            return Err(PolicyError::Invalid("version must not be empty".into()));
        }
        let mut tenants = self.tenants.write();
        let entry = tenants.entry(tenant.to_string()).or_default();
        if entry
            .versions
            .iter()
            .any(|p| p.name == doc.name && p.version == doc.version)
        {
            return Err(PolicyError::Invalid(format!(
                "policy {}@{} already exists",
                doc.name, doc.version
            )));
        }
        entry.versions.push(Arc::new(doc));
        entry.active = Some(entry.versions.len() - 1);
        Ok(())
    }

    /// The active policy for a tenant, if one has been activated.
    pub fn active(&self, tenant: &str) -> Option<Arc<PolicyDoc>> {
        let tenants = self.tenants.read();
        let entry = tenants.get(tenant)?;
        entry.active.and_then(|i| entry.versions.get(i)).cloned()
    }

    /// Fetch a retained historical version.
    pub fn get(&self, tenant: &str, name: &str, version: &str) -> Option<Arc<PolicyDoc>> {
        let tenants = self.tenants.read();
        tenants
            .get(tenant)?
            .versions
            .iter()
            .find(|p| p.name == name && p.version == version)
            .cloned()
    }

    /// Count of retained versions for a tenant.
    pub fn version_count(&self, tenant: &str) -> usize {
        self.tenants.read().get(tenant).map(|e| e.versions.len()).unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
