// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_runbook::Format;

fn doc(version: &str) -> RunbookDoc {
    RunbookDoc::parse(
        &format!("name: restart-web\nversion: \"{version}\"\nsteps: []\n"),
        Format::Yaml,
    )
    .unwrap()
}

#[test]
fn commit_and_get() {
    let store = RunbookStore::new();
    store.commit("acme", doc("1")).unwrap();
    assert!(store.get("acme", "restart-web", "1").is_some());
    assert!(store.get("acme", "restart-web", "2").is_none());
    assert!(store.get("globex", "restart-web", "1").is_none());
}

#[test]
fn versions_are_immutable() {
    let store = RunbookStore::new();
    store.commit("acme", doc("1")).unwrap();
    assert!(store.commit("acme", doc("1")).is_err());
    store.commit("acme", doc("2")).unwrap();
}

#[test]
fn head_picks_highest_version() {
    let store = RunbookStore::new();
    store.commit("acme", doc("1")).unwrap();
    store.commit("acme", doc("10")).unwrap();
    store.commit("acme", doc("2")).unwrap();
    assert_eq!(store.head("acme", "restart-web").unwrap().version_or_default(), "10");
}
