use std::sync::Arc;
use std::time::Duration;

use router_core::TextCompletion;
use serde::Deserialize;

use crate::completion::{OpenAiCompletion, UnavailableCompletion};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 8;

/// OpenAI-compatible chat endpoint used by the general agent
#[derive(Debug, Clone, Deserialize)]
pub struct LlmEndpoint {
    /// Base URL up to and including `/v1`
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Settings for the concrete agents.
#[derive(Debug, Clone)]
pub struct AgentsConfig {
    /// Absent endpoint means the general agent answers without a model
    pub llm: Option<LlmEndpoint>,
    /// Per-request HTTP timeout for the completion backend
    pub request_timeout: Duration,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            llm: Self::llm_from_env(),
            request_timeout: std::env::var("ROUTER_LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
        }
    }
}

impl AgentsConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    fn llm_from_env() -> Option<LlmEndpoint> {
        let url = std::env::var("ROUTER_LLM_URL").ok()?;
        let model = std::env::var("ROUTER_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        let api_key = std::env::var("ROUTER_LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok();
        Some(LlmEndpoint {
            url: url.trim_end_matches('/').to_string(),
            model,
            api_key,
        })
    }

    /// Completion backend for the general agent
    pub fn completion(&self) -> Arc<dyn TextCompletion> {
        match &self.llm {
            Some(endpoint) => Arc::new(OpenAiCompletion::new(endpoint, self.request_timeout)),
            None => Arc::new(UnavailableCompletion),
        }
    }
}
