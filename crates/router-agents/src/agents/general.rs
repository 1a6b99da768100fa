//! Catch-all agent backed by a language model

use std::sync::Arc;

use async_trait::async_trait;
use router_core::{AgentHandler, AgentOutput, HandlerError, TextCompletion, GENERAL_AGENT};
use tracing::warn;

const MODEL_CONFIDENCE: f64 = 0.6;
const FALLBACK_CONFIDENCE: f64 = 0.2;
const FALLBACK_REPLY: &str = "I'm not sure, but here's what I can try...";

/// Answers anything; a failing model yields a low-confidence reply instead of an error
pub struct GeneralAgent {
    completion: Arc<dyn TextCompletion>,
}

impl GeneralAgent {
    pub fn new(completion: Arc<dyn TextCompletion>) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl AgentHandler for GeneralAgent {
    fn name(&self) -> &str {
        GENERAL_AGENT
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["chat".into()]
    }

    async fn handle(&self, query: &str) -> Result<AgentOutput, HandlerError> {
        match self.completion.complete(query).await {
            Ok(text) => Ok(AgentOutput::new(GENERAL_AGENT, text, MODEL_CONFIDENCE)
                .with_field("backend", self.completion.backend())),
            Err(e) => {
                warn!(backend = self.completion.backend(), error = %e, "Completion failed");
                Ok(AgentOutput::new(GENERAL_AGENT, FALLBACK_REPLY, FALLBACK_CONFIDENCE))
            }
        }
    }
}
