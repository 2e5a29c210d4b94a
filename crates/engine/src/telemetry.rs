// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry hook contract.
//!
//! The executor emits counters and histogram observations through this
//! trait; exporters (Prometheus, OTLP) live outside the core. Spans are
//! emitted directly via `tracing` around gate + invoke + record.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter names the executor emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    RunsStarted,
    StepsExecuted,
    AdapterCalls,
    PolicyBlocks,
    ApprovalsRequested,
    Hallucinations,
}

/// Histogram names the executor emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Histogram {
    StepLatencyMs,
    RunLatencyMs,
    TokenCostUsd,
}

/// Sink for structured execution metrics.
pub trait TelemetryHook: Send + Sync {
    fn incr(&self, counter: Counter);
    fn observe(&self, histogram: Histogram, value: f64);
}

/// Discards everything.
#[derive(Default)]
pub struct NullTelemetry;

impl TelemetryHook for NullTelemetry {
    fn incr(&self, _counter: Counter) {}
    fn observe(&self, _histogram: Histogram, _value: f64) {}
}

/// In-process counters, good enough for tests and `tracing`-level
/// observability without an exporter.
#[derive(Default)]
pub struct Telemetry {
    runs_started: AtomicU64,
    steps_executed: AtomicU64,
    adapter_calls: AtomicU64,
    policy_blocks: AtomicU64,
    approvals_requested: AtomicU64,
    hallucinations: AtomicU64,
    observations: Mutex<HashMap<&'static str, Vec<f64>>>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, counter: Counter) -> u64 {
        self.cell(counter).load(Ordering::Relaxed)
    }

    pub fn observations(&self, histogram: Histogram) -> Vec<f64> {
        self.observations.lock().get(histogram_name(histogram)).cloned().unwrap_or_default()
    }

    fn cell(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::RunsStarted => &self.runs_started,
            Counter::StepsExecuted => &self.steps_executed,
            Counter::AdapterCalls => &self.adapter_calls,
            Counter::PolicyBlocks => &self.policy_blocks,
            Counter::ApprovalsRequested => &self.approvals_requested,
            Counter::Hallucinations => &self.hallucinations,
        }
    }
}

fn histogram_name(histogram: Histogram) -> &'static str {
    match histogram {
        Histogram::StepLatencyMs => "step_latency_ms",
        Histogram::RunLatencyMs => "run_latency_ms",
        Histogram::TokenCostUsd => "token_cost_usd",
    }
}

impl TelemetryHook for Telemetry {
    fn incr(&self, counter: Counter) {
        self.cell(counter).fetch_add(1, Ordering::Relaxed);
    }

    fn observe(&self, histogram: Histogram, value: f64) {
        tracing::debug!(histogram = histogram_name(histogram), value, "observed");
        self.observations.lock().entry(histogram_name(histogram)).or_default().push(value);
    }
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
