// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-adapters: Effector adapter contract, registry, and builtin mocks

pub mod builtin;
mod contract;
mod registry;
mod schema;
mod shim;

#[cfg(any(test, feature = "test-support"))]
pub mod scripted;

pub use contract::{
    Adapter, AdapterError, AdapterErrorKind, AdapterSpec, Classification, Invocation, InvokeCtx,
};
pub use registry::AdapterRegistry;
pub use schema::{secret_keys, validate_args, SchemaViolation};
pub use shim::{Intent, IntentRecorder};
