//! Fixed-answer specialists: finance, security and daily briefing.

use async_trait::async_trait;
use router_core::{AgentHandler, AgentOutput, HandlerError};

/// Specialist that acknowledges a query in its own domain
pub struct SpecialistAgent {
    name: &'static str,
    capabilities: &'static [&'static str],
    reply: &'static str,
    confidence: f64,
}

impl SpecialistAgent {
    pub fn finance() -> Self {
        Self {
            name: "finance",
            capabilities: &["budget.summary", "invoice.lookup"],
            reply: "Finance agent reviewed your request",
            confidence: 0.9,
        }
    }

    pub fn security() -> Self {
        Self {
            name: "security",
            capabilities: &["alarm.status", "camera.review"],
            reply: "Security agent checked the system",
            confidence: 0.85,
        }
    }

    pub fn daily_briefing() -> Self {
        Self {
            name: "daily_briefing",
            capabilities: &["briefing.today", "agenda.summary"],
            reply: "Today's briefing is empty",
            confidence: 0.8,
        }
    }
}

#[async_trait]
impl AgentHandler for SpecialistAgent {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.iter().map(|c| c.to_string()).collect()
    }

    async fn handle(&self, query: &str) -> Result<AgentOutput, HandlerError> {
        if query.trim().is_empty() {
            return Err(HandlerError::InvalidQuery("empty query".into()));
        }
        Ok(AgentOutput::new(self.name, self.reply, self.confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_finance_answers_confidently() {
        let out = SpecialistAgent::finance().handle("show my budget").await.unwrap();
        assert_eq!(out.agent, "finance");
        assert_eq!(out.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let err = SpecialistAgent::security().handle("  ").await.unwrap_err();
        assert!(matches!(err, HandlerError::InvalidQuery(_)));
    }
}
