//! Home automation: maps known scene phrases to hub actions.
//!
//! Only an exact scene phrase is acted on; the result then carries
//! `status: "ok"`. Anything else is answered without a status, which the
//! home automation result contract rejects so the query falls back.

use async_trait::async_trait;
use router_core::{AgentHandler, AgentOutput, HandlerError};
use tracing::debug;

const NAME: &str = "home_automation";

const SCENES: &[(&str, &str)] = &[
    ("good morning", "Lights on, blinds open, coffee started"),
    ("good night", "All lights off, doors locked"),
    ("movie night", "Living room dimmed, projector on"),
    ("leave home", "Lights off, thermostat set to away"),
    ("open the garage", "Garage door opening"),
];

pub struct HomeAutomationAgent {
    scenes: Vec<(String, String)>,
}

impl Default for HomeAutomationAgent {
    fn default() -> Self {
        Self {
            scenes: SCENES
                .iter()
                .map(|(p, a)| (p.to_string(), a.to_string()))
                .collect(),
        }
    }
}

impl HomeAutomationAgent {
    pub fn new() -> Self {
        Self::default()
    }

    fn interpret(&self, phrase: &str) -> Option<&str> {
        let phrase = phrase.trim().to_lowercase();
        self.scenes
            .iter()
            .find(|(p, _)| *p == phrase)
            .map(|(_, action)| action.as_str())
    }
}

#[async_trait]
impl AgentHandler for HomeAutomationAgent {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["scene.run".into(), "device.toggle".into()]
    }

    async fn handle(&self, query: &str) -> Result<AgentOutput, HandlerError> {
        match self.interpret(query) {
            Some(action) => {
                debug!(scene = query, "Scene matched");
                Ok(AgentOutput::new(NAME, action, 0.8).with_field("status", "ok"))
            }
            None => Ok(AgentOutput::new(
                NAME,
                format!("No scene matches '{}'", query.trim()),
                0.8,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_known_scene_reports_ok() {
        let out = HomeAutomationAgent::new().handle("Movie Night").await.unwrap();
        assert_eq!(out.field("status"), Some(json!("ok")));
    }

    #[tokio::test]
    async fn test_unknown_phrase_has_no_status() {
        let out = HomeAutomationAgent::new()
            .handle("toggle kitchen light")
            .await
            .unwrap();
        assert_eq!(out.field("status"), None);
        assert_eq!(out.confidence, 0.8);
    }
}
