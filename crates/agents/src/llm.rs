// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM client abstraction and schema-validated JSON completion.

use crate::roles::AgentError;
use fm_adapters::validate_args;
use fm_core::Usage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One completion: raw text plus accounted usage.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Usage,
}

/// Provider-agnostic completion interface. The engine injects a real
/// HTTP client or a test double.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        role: &str,
        system: &str,
        user: &str,
    ) -> Result<LlmResponse, AgentError>;
}

/// Complete and parse against `schema`, re-prompting on non-conforming
/// output up to `max_attempts`. Usage accrues across every attempt;
/// failed completions still cost tokens.
pub async fn llm_json(
    client: &dyn LlmClient,
    role: &str,
    system: &str,
    user: &str,
    schema: &Value,
    max_attempts: u32,
) -> Result<(Value, Usage), AgentError> {
    let mut usage = Usage::default();
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        let prompt = if attempt == 1 {
            user.to_string()
        } else {
            format!(
                "{user}\n\nYour previous output was rejected: {last_error}\n\
                 Respond with JSON conforming to the schema, nothing else."
            )
        };

        let response = client.complete(role, system, &prompt).await?;
        usage.absorb(&response.usage);

        match parse_against_schema(&response.text, schema) {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(role, attempt, "llm output accepted after retry");
                }
                return Ok((value, usage));
            }
            Err(error) => {
                tracing::warn!(role, attempt, %error, "llm output rejected");
                last_error = error;
            }
        }
    }

    Err(AgentError::Malformed(format!("{role}: {last_error}")))
}

fn parse_against_schema(text: &str, schema: &Value) -> Result<Value, String> {
    let value: Value =
        serde_json::from_str(text.trim()).map_err(|e| format!("invalid JSON: {e}"))?;
    validate_args(schema, &value).map_err(|v| format!("schema violation at {v}"))?;
    Ok(value)
}

const API_URL_ENV: &str = "FOREMAN_LLM_URL";
const API_KEY_ENV: &str = "FOREMAN_LLM_API_KEY";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

// Published per-million-token rates for the default model.
const COST_PER_INPUT_TOKEN: f64 = 3.0 / 1_000_000.0;
const COST_PER_OUTPUT_TOKEN: f64 = 15.0 / 1_000_000.0;

/// HTTP completion client.
///
/// Reads the endpoint from `FOREMAN_LLM_URL` and the key from
/// `FOREMAN_LLM_API_KEY`.
pub struct HttpLlmClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl HttpLlmClient {
    pub fn from_env() -> Result<Self, AgentError> {
        let url = std::env::var(API_URL_ENV)
            .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string());
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| AgentError::Transport(format!("{API_KEY_ENV} not set")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
            api_key,
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct TokenUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[async_trait::async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(
        &self,
        role: &str,
        system: &str,
        user: &str,
    ) -> Result<LlmResponse, AgentError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            max_tokens: 1024,
            system: system.to_string(),
            messages: vec![Message { role: "user".to_string(), content: user.to_string() }],
        };

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Transport(format!("{role} API error ({status}): {body}")));
        }

        let parsed: CompletionResponse =
            response.json().await.map_err(|e| AgentError::Transport(e.to_string()))?;
        let text = parsed
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| AgentError::Transport(format!("{role}: empty completion")))?;

        let tokens = parsed.usage.unwrap_or_default();
        let usage = Usage {
            tokens_in: tokens.input_tokens,
            tokens_out: tokens.output_tokens,
            cost_usd: tokens.input_tokens as f64 * COST_PER_INPUT_TOKEN
                + tokens.output_tokens as f64 * COST_PER_OUTPUT_TOKEN,
            wall_ms: start.elapsed().as_millis() as u64,
        };
        Ok(LlmResponse { text, usage })
    }
}

#[cfg(test)]
#[path = "llm_tests.rs"]
mod tests;
