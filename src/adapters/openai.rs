//! OpenAI-compatible runtime over HTTP.
//!
//! Supports the Responses API (`POST {base}/responses`) and Chat Completions
//! (`POST {base}/chat/completions`). The decoded body is returned untouched.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{AgentRuntime, AgentSpec};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Which endpoint family to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiMode {
    #[default]
    Responses,
    ChatCompletions,
}

impl std::str::FromStr for ApiMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "responses" => Ok(ApiMode::Responses),
            "chat_completions" => Ok(ApiMode::ChatCompletions),
            other => Err(format!("unknown API mode '{}'", other)),
        }
    }
}

/// HTTP client for OpenAI-compatible endpoints
pub struct OpenAiRuntime {
    base_url: String,
    api_key: Option<String>,
    default_model: Option<String>,
    api_mode: ApiMode,
    client: reqwest::Client,
}

impl OpenAiRuntime {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_model: Option<String>,
        api_mode: ApiMode,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            default_model,
            api_mode,
            client: reqwest::Client::new(),
        }
    }

    /// Build endpoint URL
    fn endpoint(&self) -> String {
        match self.api_mode {
            ApiMode::Responses => format!("{}/responses", self.base_url),
            ApiMode::ChatCompletions => format!("{}/chat/completions", self.base_url),
        }
    }

    /// Build the request body for one invocation
    fn request_body(&self, agent: &AgentSpec, input: &str) -> Value {
        let model = agent.model.as_ref().or(self.default_model.as_ref());
        let mut body = match self.api_mode {
            ApiMode::Responses => json!({
                "instructions": agent.instructions,
                "input": input,
            }),
            ApiMode::ChatCompletions => json!({
                "messages": [
                    {"role": "system", "content": agent.instructions},
                    {"role": "user", "content": input},
                ],
            }),
        };
        if let (Some(model), Some(map)) = (model, body.as_object_mut()) {
            map.insert("model".to_string(), Value::String(model.clone()));
        }
        body
    }
}

#[async_trait]
impl AgentRuntime for OpenAiRuntime {
    fn name(&self) -> &str {
        "openai"
    }

    async fn invoke(&self, agent: &AgentSpec, input: &str) -> Result<Value> {
        let url = self.endpoint();

        let mut request = self.client.post(&url).json(&self.request_body(agent, input));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach agent runtime at {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Agent runtime returned {}: {}", status, body.trim());
        }

        response
            .json::<Value>()
            .await
            .context("Failed to decode agent runtime response")
    }
}
