// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::schemas::TOOLCALLER_OUT;
use fm_core::Usage;
use parking_lot::Mutex;

/// Fake client that replays scripted completions.
pub(crate) struct FakeLlm {
    responses: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub(crate) fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for FakeLlm {
    async fn complete(
        &self,
        _role: &str,
        _system: &str,
        user: &str,
    ) -> Result<LlmResponse, crate::AgentError> {
        self.prompts.lock().push(user.to_string());
        let mut responses = self.responses.lock();
        let text = if responses.is_empty() { "{}".to_string() } else { responses.remove(0) };
        Ok(LlmResponse {
            text,
            usage: Usage { tokens_in: 10, tokens_out: 20, cost_usd: 0.001, wall_ms: 50 },
        })
    }
}

const VALID_CALL: &str =
    r#"{"tool": "tracker.create_issue", "args": {"title": "x"}, "confidence": 0.8, "rationale": "r"}"#;

#[tokio::test]
async fn conforming_output_accepted_first_try() {
    let client = FakeLlm::new(&[VALID_CALL]);
    let (value, usage) =
        llm_json(&client, "toolcaller", "sys", "user", &TOOLCALLER_OUT, 3).await.unwrap();
    assert_eq!(value["tool"], "tracker.create_issue");
    assert_eq!(usage.tokens_in, 10);
}

#[tokio::test]
async fn malformed_json_retried_then_accepted() {
    let client = FakeLlm::new(&["not json at all", VALID_CALL]);
    let (value, usage) =
        llm_json(&client, "toolcaller", "sys", "user", &TOOLCALLER_OUT, 3).await.unwrap();
    assert_eq!(value["confidence"], 0.8);
    // both attempts accrue usage
    assert_eq!(usage.tokens_in, 20);
    assert_eq!(usage.tokens_out, 40);

    let prompts = client.prompts.lock();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("rejected"), "re-prompt must carry the rejection");
}

#[tokio::test]
async fn schema_violation_retried() {
    // missing required "rationale"
    let bad = r#"{"tool": "t.c", "args": {}, "confidence": 0.5}"#;
    let client = FakeLlm::new(&[bad, VALID_CALL]);
    let (value, _) =
        llm_json(&client, "toolcaller", "sys", "user", &TOOLCALLER_OUT, 3).await.unwrap();
    assert_eq!(value["rationale"], "r");
}

#[tokio::test]
async fn exhausted_retries_surface_malformed() {
    let client = FakeLlm::new(&["nope", "still nope", "never"]);
    let err = llm_json(&client, "planner", "sys", "user", &TOOLCALLER_OUT, 3).await.unwrap_err();
    assert!(matches!(err, AgentError::Malformed(_)));
    assert_eq!(client.prompts.lock().len(), 3);
}

#[tokio::test]
async fn confidence_bounds_enforced_by_schema() {
    let out_of_range =
        r#"{"tool": "t.c", "args": {}, "confidence": 1.5, "rationale": "r"}"#;
    let client = FakeLlm::new(&[out_of_range]);
    let err = llm_json(&client, "toolcaller", "sys", "user", &TOOLCALLER_OUT, 1).await.unwrap_err();
    assert!(matches!(err, AgentError::Malformed(_)));
}
