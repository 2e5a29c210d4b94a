// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn records_intents_in_order() {
    let recorder = IntentRecorder::new();
    recorder.record("tracker.create_issue", &json!({"title": "a"}));
    recorder.record("cluster.restart_deployment", &json!({"deployment": "web"}));

    let intents = recorder.intents();
    assert_eq!(intents.len(), 2);
    assert_eq!(intents[0].tool, "tracker.create_issue");
    assert_eq!(intents[1].args["deployment"], "web");
}

#[test]
fn synthesized_output_marks_recording() {
    let recorder = IntentRecorder::new();
    let invocation = recorder.record("pager.create_incident", &json!({}));
    assert_eq!(invocation.output["recorded"], true);
    assert_eq!(invocation.usage.wall_ms, 0);
}

#[test]
fn empty_until_first_record() {
    let recorder = IntentRecorder::new();
    assert!(recorder.is_empty());
    recorder.record("x.y", &json!({}));
    assert_eq!(recorder.len(), 1);
}
