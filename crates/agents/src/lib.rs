// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-agents: Planner, toolcaller, and reviewer roles
//!
//! Each role ships in two modes: a deterministic stub and a probabilistic
//! LLM mode whose JSON output is validated against a strict schema and
//! re-prompted up to a fixed bound.

mod llm;
mod llm_roles;
mod roles;
mod schemas;
mod stub;

pub use llm::{llm_json, HttpLlmClient, LlmClient, LlmResponse};
pub use llm_roles::{LlmPlanner, LlmReviewer, LlmToolcaller};
pub use roles::{
    AgentError, Disagreement, PlannedStep, Planner, Review, ReviewRequest, Reviewer, ToolCall,
    Toolcaller,
};
pub use schemas::{PLANNER_OUT, REVIEWER_OUT, TOOLCALLER_OUT};
pub use stub::{StubPlanner, StubReviewer, StubToolcaller};

/// Bounded re-prompting for non-conforming LLM output.
pub const MAX_AGENT_ATTEMPTS: u32 = 3;
