// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn counters_accumulate() {
    let telemetry = Telemetry::new();
    telemetry.incr(Counter::RunsStarted);
    telemetry.incr(Counter::StepsExecuted);
    telemetry.incr(Counter::StepsExecuted);
    assert_eq!(telemetry.counter(Counter::RunsStarted), 1);
    assert_eq!(telemetry.counter(Counter::StepsExecuted), 2);
    assert_eq!(telemetry.counter(Counter::PolicyBlocks), 0);
}

#[test]
fn observations_recorded_per_histogram() {
    let telemetry = Telemetry::new();
    telemetry.observe(Histogram::StepLatencyMs, 12.0);
    telemetry.observe(Histogram::StepLatencyMs, 20.0);
    telemetry.observe(Histogram::TokenCostUsd, 0.05);
    assert_eq!(telemetry.observations(Histogram::StepLatencyMs), vec![12.0, 20.0]);
    assert_eq!(telemetry.observations(Histogram::TokenCostUsd), vec![0.05]);
    assert!(telemetry.observations(Histogram::RunLatencyMs).is_empty());
}

#[test]
fn null_telemetry_discards() {
    let telemetry = NullTelemetry;
    telemetry.incr(Counter::Hallucinations);
    telemetry.observe(Histogram::RunLatencyMs, 1.0);
}
