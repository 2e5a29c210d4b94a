// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::document::{Format, RunbookDoc};

fn parse_err(input: &str) -> String {
    RunbookDoc::parse(input, Format::Yaml).unwrap_err().to_string()
}

#[test]
fn rejects_empty_name() {
    let err = parse_err("name: \"\"\nsteps: []\n");
    assert!(err.contains("name must not be empty"), "{err}");
}

#[test]
fn rejects_duplicate_step_names() {
    let err = parse_err(
        r#"
name: rb
steps:
  - {name: a, tool: x.y}
  - {name: a, tool: x.z}
"#,
    );
    assert!(err.contains("duplicate step name"), "{err}");
}

#[test]
fn rejects_step_without_tool_or_prompt() {
    let err = parse_err("name: rb\nsteps:\n  - name: a\n");
    assert!(err.contains("needs either tool+args or prompt"), "{err}");
}

#[test]
fn rejects_uppercase_tool_id() {
    let err = parse_err("name: rb\nsteps:\n  - {name: a, tool: Tracker.Create}\n");
    assert!(err.contains("dotted lower-case"), "{err}");
}

#[test]
fn rejects_undotted_tool_id() {
    let err = parse_err("name: rb\nsteps:\n  - {name: a, tool: tracker}\n");
    assert!(err.contains("dotted lower-case"), "{err}");
}

#[test]
fn rejects_wildcard_as_tool() {
    // wildcards belong in allowlists, not runbooks
    let err = parse_err("name: rb\nsteps:\n  - {name: a, tool: \"tracker.*\"}\n");
    assert!(err.contains("dotted lower-case"), "{err}");
}

#[test]
fn rejects_non_mapping_args() {
    let err = parse_err("name: rb\nsteps:\n  - {name: a, tool: x.y, args: [1, 2]}\n");
    assert!(err.contains("args must be a mapping"), "{err}");
}

#[test]
fn rejects_zero_timeout() {
    let err = parse_err("name: rb\nsteps:\n  - {name: a, tool: x.y, timeout_ms: 0}\n");
    assert!(err.contains("timeout_ms must be positive"), "{err}");
}

#[test]
fn compensates_must_point_backwards() {
    let err = parse_err(
        r#"
name: rb
steps:
  - {name: a, tool: x.y, compensates: b}
  - {name: b, tool: x.z}
"#,
    );
    assert!(err.contains("compensates unknown earlier step"), "{err}");
}

#[test]
fn compensates_earlier_step_accepted() {
    let doc = RunbookDoc::parse(
        r#"
name: rb
steps:
  - {name: a, tool: x.y}
  - {name: undo-a, tool: x.z, compensates: a}
"#,
        Format::Yaml,
    )
    .unwrap();
    assert_eq!(doc.steps[1].compensates.as_deref(), Some("a"));
}

#[test]
fn tool_pattern_accepts_multi_segment() {
    assert!(crate::validate::TOOL_ID_PATTERN.is_match("cluster.node.cordon"));
    assert!(!crate::validate::TOOL_ID_PATTERN.is_match("cluster."));
    assert!(!crate::validate::TOOL_ID_PATTERN.is_match(".cordon"));
}
