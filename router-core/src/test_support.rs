//! Handlers shared by unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::dispatch::{AgentHandler, AgentOutput, HandlerError};

/// Returns the same output every time and counts calls
pub struct FixedHandler {
    name: String,
    confidence: f64,
    fields: Map<String, Value>,
    calls: AtomicUsize,
}

impl FixedHandler {
    pub fn new(name: &str, confidence: f64) -> Self {
        Self {
            name: name.to_string(),
            confidence,
            fields: Map::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentHandler for FixedHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<String> {
        vec![format!("{}.answer", self.name)]
    }

    async fn handle(&self, query: &str) -> Result<AgentOutput, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut output = AgentOutput::new(
            self.name.clone(),
            format!("{} handled: {}", self.name, query),
            self.confidence,
        );
        output.extra = self.fields.clone();
        Ok(output)
    }
}

/// Always reports an upstream failure
pub struct FailingHandler {
    name: String,
}

impl FailingHandler {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl AgentHandler for FailingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _query: &str) -> Result<AgentOutput, HandlerError> {
        Err(HandlerError::Upstream("backend offline".to_string()))
    }
}

/// Sleeps before answering
pub struct SlowHandler {
    name: String,
    delay: Duration,
}

impl SlowHandler {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl AgentHandler for SlowHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, query: &str) -> Result<AgentOutput, HandlerError> {
        tokio::time::sleep(self.delay).await;
        Ok(AgentOutput::new(self.name.clone(), query, 0.9))
    }
}
