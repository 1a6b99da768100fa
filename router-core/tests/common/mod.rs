//! Handlers and fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use router_core::{
    AgentHandler, AgentOutput, DispatchTable, HandlerError, RouteCoordinator, RouterConfig,
    SharedRouteCoordinator,
};
use tempfile::TempDir;

/// Answers with a fixed confidence and optional extra fields
pub struct StaticAgent {
    name: &'static str,
    confidence: f64,
    fields: Vec<(&'static str, &'static str)>,
}

impl StaticAgent {
    pub fn new(name: &'static str, confidence: f64) -> Self {
        Self {
            name,
            confidence,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: &'static str, value: &'static str) -> Self {
        self.fields.push((key, value));
        self
    }

    pub fn arc(self) -> Arc<dyn AgentHandler> {
        Arc::new(self)
    }
}

#[async_trait]
impl AgentHandler for StaticAgent {
    fn name(&self) -> &str {
        self.name
    }

    async fn handle(&self, query: &str) -> Result<AgentOutput, HandlerError> {
        let mut output = AgentOutput::new(
            self.name,
            format!("[{}] {}", self.name, query),
            self.confidence,
        );
        for (key, value) in &self.fields {
            output = output.with_field(*key, *value);
        }
        Ok(output)
    }
}

/// Always fails upstream
pub struct BrokenAgent(pub &'static str);

#[async_trait]
impl AgentHandler for BrokenAgent {
    fn name(&self) -> &str {
        self.0
    }

    async fn handle(&self, _query: &str) -> Result<AgentOutput, HandlerError> {
        Err(HandlerError::Upstream("connection refused".to_string()))
    }
}

/// General at 0.2, finance at 0.9, home automation without a status field
pub fn household_table() -> DispatchTable {
    DispatchTable::new(StaticAgent::new("general", 0.2).arc())
        .register(StaticAgent::new("finance", 0.9).arc())
        .register(StaticAgent::new("home_automation", 0.8).arc())
        .register(Arc::new(BrokenAgent("security")))
}

pub async fn coordinator(dir: &TempDir, table: DispatchTable) -> SharedRouteCoordinator {
    RouteCoordinator::open(RouterConfig::rooted_at(dir.path()), table.shared())
        .await
        .unwrap()
        .shared()
}
