// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn has_role() {
    let subject = Subject::new("acme", "op@acme", ActorKind::User)
        .with_roles(vec!["Admin".into(), "Operator".into()]);
    assert!(subject.has_role("Admin"));
    assert!(!subject.has_role("Viewer"));
}

#[test]
fn system_subject() {
    let subject = Subject::system("acme");
    assert_eq!(subject.kind, ActorKind::System);
    assert_eq!(subject.actor, "system");
    assert!(subject.roles.is_empty());
}

#[test]
fn actor_kind_wire_strings() {
    assert_eq!(serde_json::to_string(&ActorKind::Api).unwrap(), "\"api\"");
    assert_eq!(ActorKind::User.to_string(), "user");
}
