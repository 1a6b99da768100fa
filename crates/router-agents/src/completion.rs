//! Language-model backends for [`TextCompletion`]

use std::time::Duration;

use async_trait::async_trait;
use router_core::{CompletionError, CompletionResult, TextCompletion};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmEndpoint;

/// Chat completions against an OpenAI-compatible `/v1` endpoint
pub struct OpenAiCompletion {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenAiCompletion {
    pub fn new(endpoint: &LlmEndpoint, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: endpoint.url.clone(),
            model: endpoint.model.clone(),
            api_key: endpoint.api_key.clone(),
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Pull `choices[0].message.content` out of a chat completion body
fn extract_content(body: &Value) -> CompletionResult<String> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CompletionError::ParseError("response has no message content".into()))
}

#[async_trait]
impl TextCompletion for OpenAiCompletion {
    fn backend(&self) -> &str {
        "openai"
    }

    async fn complete(&self, query: &str) -> CompletionResult<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": query}],
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.url))
            .json(&body)
            .timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| CompletionError::RequestFailed(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CompletionError::RequestFailed(format!("HTTP {}", status)));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| CompletionError::ParseError(e.to_string()))?;
        debug!(model = %self.model, "Completion received");
        extract_content(&body)
    }
}

/// Backend used when no endpoint is configured; every call fails
pub struct UnavailableCompletion;

#[async_trait]
impl TextCompletion for UnavailableCompletion {
    fn backend(&self) -> &str {
        "unavailable"
    }

    async fn complete(&self, _query: &str) -> CompletionResult<String> {
        Err(CompletionError::NotConfigured(
            "no language model endpoint configured".into(),
        ))
    }
}

/// Check if an inference endpoint is reachable (GET /models).
pub async fn check_endpoint(url: &str) -> bool {
    let models_url = format!("{url}/models");
    match reqwest::Client::new()
        .get(&models_url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}
