// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn codes_map_to_taxonomy() {
    assert_eq!(EngineError::Validation("x".into()).code(), ErrorCode::Validation);
    assert_eq!(EngineError::Policy("x".into()).code(), ErrorCode::Policy);
    assert_eq!(
        EngineError::Adapter(AdapterError::transient("x")).code(),
        ErrorCode::AdapterTransient
    );
    assert_eq!(
        EngineError::Adapter(AdapterError::timeout("x")).code(),
        ErrorCode::AdapterTimeout
    );
    assert_eq!(
        EngineError::Adapter(AdapterError::permanent("x")).code(),
        ErrorCode::AdapterPermanent
    );
    assert_eq!(
        EngineError::Agent(AgentError::Malformed("x".into())).code(),
        ErrorCode::AgentMalformed
    );
    assert_eq!(
        EngineError::Store(StoreError::LeaseLost).code(),
        ErrorCode::Concurrency
    );
    assert_eq!(EngineError::Store(StoreError::Io("x".into())).code(), ErrorCode::Store);
    assert_eq!(EngineError::Internal("x".into()).code(), ErrorCode::Internal);
}
