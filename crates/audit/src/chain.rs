// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hash chaining and verification.

use crate::canonical::canonicalize;
use crate::event::AuditEvent;
use sha2::{Digest, Sha256};

/// `prev_hash` of the first event in a tenant chain.
pub const GENESIS_HASH: &str = "";

/// `this_hash = SHA-256(prev_hash ‖ canonical(event \ this_hash))`, hex.
pub fn hash_over(prev_hash: &str, hashed_view: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(canonicalize(hashed_view).as_bytes());
    hex::encode(hasher.finalize())
}

/// First point where a chain fails verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub seq: u64,
    pub expected: String,
    pub actual: String,
    pub reason: &'static str,
}

/// Recompute hashes over `events` (which must start at the chain head or
/// carry the correct `prev_hash` of the event before the range) and
/// report the first divergence. `Ok(())` end-to-end is proof of no
/// tampering.
pub fn verify_chain(events: &[AuditEvent]) -> Result<(), Divergence> {
    let mut prev_hash: Option<&str> = None;
    let mut prev_seq: Option<u64> = None;

    for event in events {
        if let Some(prev_seq) = prev_seq {
            if event.seq != prev_seq + 1 {
                return Err(Divergence {
                    seq: event.seq,
                    expected: format!("seq {}", prev_seq + 1),
                    actual: format!("seq {}", event.seq),
                    reason: "sequence gap",
                });
            }
        }
        if let Some(prev_hash) = prev_hash {
            if event.prev_hash != prev_hash {
                return Err(Divergence {
                    seq: event.seq,
                    expected: prev_hash.to_string(),
                    actual: event.prev_hash.clone(),
                    reason: "prev_hash mismatch",
                });
            }
        }

        let recomputed = hash_over(&event.prev_hash, &event.hashed_view());
        if recomputed != event.this_hash {
            return Err(Divergence {
                seq: event.seq,
                expected: recomputed,
                actual: event.this_hash.clone(),
                reason: "this_hash mismatch",
            });
        }

        prev_hash = Some(&event.this_hash);
        prev_seq = Some(event.seq);
    }

    Ok(())
}

#[cfg(test)]
#[path = "chain_tests.rs"]
mod tests;
