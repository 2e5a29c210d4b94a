// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-engine: Durable run executor and its collaborators
//!
//! The executor drives a run from creation to a terminal status through
//! the agent pipeline, the policy gate, the approval rendezvous, and the
//! adapter registry, checkpointing every step-level effect so restart
//! resumes at the next non-terminal step.

mod approval;
mod backoff;
mod env;
mod error;
mod executor;
mod runbooks;
mod service;
mod shadow;
mod telemetry;

pub use approval::ApprovalService;
pub use backoff::RetryConfig;
pub use env::EngineEnv;
pub use error::EngineError;
pub use executor::Executor;
pub use runbooks::RunbookStore;
pub use service::{RunService, RunServiceBuilder, RunView};
pub use shadow::{args_subset, compare, ShadowReport, StepCompare};
pub use telemetry::{Counter, Histogram, NullTelemetry, Telemetry, TelemetryHook};
