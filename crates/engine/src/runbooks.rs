// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Committed runbook versions, keyed by (tenant, name, version).

use fm_runbook::RunbookDoc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of committed runbooks. Documents are immutable once
/// committed at a version; new versions are new entries.
#[derive(Default)]
pub struct RunbookStore {
    docs: RwLock<HashMap<(String, String, String), Arc<RunbookDoc>>>,
}

impl RunbookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a document under its own name and version. Re-committing
    /// an existing version is rejected so history stays immutable.
    pub fn commit(&self, tenant: &str, doc: RunbookDoc) -> Result<(), String> {
        let key =
            (tenant.to_string(), doc.name.clone(), doc.version_or_default().to_string());
        let mut docs = self.docs.write();
        if docs.contains_key(&key) {
            return Err(format!("runbook {}@{} already committed", key.1, key.2));
        }
        docs.insert(key, Arc::new(doc));
        Ok(())
    }

    pub fn get(&self, tenant: &str, name: &str, version: &str) -> Option<Arc<RunbookDoc>> {
        self.docs
            .read()
            .get(&(tenant.to_string(), name.to_string(), version.to_string()))
            .cloned()
    }

    /// Highest committed version for a name, by string-numeric order.
    pub fn head(&self, tenant: &str, name: &str) -> Option<Arc<RunbookDoc>> {
        let docs = self.docs.read();
        docs.iter()
            .filter(|((t, n, _), _)| t == tenant && n == name)
            .max_by_key(|((_, _, v), _)| v.parse::<u64>().unwrap_or(0))
            .map(|(_, doc)| Arc::clone(doc))
    }
}

#[cfg(test)]
#[path = "runbooks_tests.rs"]
mod tests;
