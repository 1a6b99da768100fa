//! Agent dispatch table
//!
//! Maps agent names to [`AgentHandler`]s. Every invocation goes through
//! [`DispatchTable::invoke`], which applies the handler deadline and turns
//! any error or timeout into a low-confidence [`AgentOutput`], so the
//! router never sees a handler failure.
//!
//! ```text
//! invoke(name, query)
//!   ├─ handler Ok          → output as returned (confidence clamped)
//!   ├─ handler Err         → degraded output, confidence 0.1
//!   └─ deadline exceeded   → degraded output, confidence 0.1
//! ```

pub mod completion;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::state::GENERAL_AGENT;

pub use completion::{CompletionError, CompletionResult, TextCompletion};

/// Confidence reported when a handler had to be degraded
pub const DEGRADED_CONFIDENCE: f64 = 0.1;

/// Field set on every degraded output
pub const DEGRADED_FIELD: &str = "degraded";

/// Errors a handler may report; converted at the dispatch boundary
#[derive(Error, Debug)]
pub enum HandlerError {
    /// An upstream dependency (LLM, hub API) failed
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// The handler did not answer before its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The handler cannot work with this query
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl From<CompletionError> for HandlerError {
    fn from(e: CompletionError) -> Self {
        HandlerError::Upstream(e.to_string())
    }
}

/// Output of one handler invocation.
///
/// Extra fields serialize flat next to `agent`, `response` and
/// `confidence`, so result contracts can demand any of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent: String,
    pub response: String,
    pub confidence: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentOutput {
    pub fn new(agent: impl Into<String>, response: impl Into<String>, confidence: f64) -> Self {
        Self {
            agent: agent.into(),
            response: response.into(),
            confidence: clamp_confidence(confidence),
            extra: Map::new(),
        }
    }

    /// Attach an extra field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Low-confidence stand-in for a failed invocation
    pub fn degraded(agent: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(
            agent,
            format!("Unable to complete the request right now ({})", reason),
            DEGRADED_CONFIDENCE,
        )
        .with_field(DEGRADED_FIELD, true)
        .with_field("error", reason)
    }

    /// Value of `key`, including the fixed fields
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            "agent" => Some(Value::from(self.agent.clone())),
            "response" => Some(Value::from(self.response.clone())),
            "confidence" => Some(Value::from(self.confidence)),
            _ => self.extra.get(key).cloned(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.extra
            .get(DEGRADED_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// A named handler capability
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Stable agent name used as the dispatch key
    fn name(&self) -> &str;

    /// Capability labels reported in agent listings
    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Answer `query`
    async fn handle(&self, query: &str) -> Result<AgentOutput, HandlerError>;
}

/// Public view of a registered agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub capabilities: Vec<String>,
    pub heartbeat: bool,
    pub escalation_ready: bool,
}

struct Registered {
    handler: Arc<dyn AgentHandler>,
    heartbeat: AtomicBool,
    escalation_ready: AtomicBool,
}

impl Registered {
    fn new(handler: Arc<dyn AgentHandler>, escalation_ready: bool) -> Self {
        Self {
            handler,
            heartbeat: AtomicBool::new(false),
            escalation_ready: AtomicBool::new(escalation_ready),
        }
    }

    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            name: self.handler.name().to_string(),
            capabilities: self.handler.capabilities(),
            heartbeat: self.heartbeat.load(Ordering::Relaxed),
            escalation_ready: self.escalation_ready.load(Ordering::Relaxed),
        }
    }
}

/// Shared reference to a dispatch table
pub type SharedDispatchTable = Arc<DispatchTable>;

/// Registry of agent handlers with a mandatory general fallback
pub struct DispatchTable {
    handlers: BTreeMap<String, Registered>,
    timeout: Duration,
}

impl DispatchTable {
    /// Table whose fallback is `general`, registered under the general name
    pub fn new(general: Arc<dyn AgentHandler>) -> Self {
        let mut handlers = BTreeMap::new();
        handlers.insert(GENERAL_AGENT.to_string(), Registered::new(general, true));
        Self {
            handlers,
            timeout: Duration::from_secs(10),
        }
    }

    /// Deadline applied to every invocation
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add or replace a handler under its own name.
    ///
    /// A handler named `general` replaces the fallback.
    pub fn register(mut self, handler: Arc<dyn AgentHandler>) -> Self {
        let name = handler.name().to_string();
        let ready = name == GENERAL_AGENT;
        debug!(agent = %name, "Registering agent handler");
        self.handlers.insert(name, Registered::new(handler, ready));
        self
    }

    /// Create a shared reference to this table
    pub fn shared(self) -> SharedDispatchTable {
        Arc::new(self)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether `name` has its own handler
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered agent names, sorted
    pub fn names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Descriptors for every registered agent
    pub fn agents(&self) -> Vec<AgentDescriptor> {
        self.handlers.values().map(Registered::descriptor).collect()
    }

    /// Descriptor for `name`, if registered
    pub fn descriptor(&self, name: &str) -> Option<AgentDescriptor> {
        self.handlers.get(name).map(Registered::descriptor)
    }

    /// Set the heartbeat flag; false when `name` is unknown
    pub fn update_heartbeat(&self, name: &str, alive: bool) -> bool {
        match self.handlers.get(name) {
            Some(entry) => {
                entry.heartbeat.store(alive, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Set the escalation-readiness flag; false when `name` is unknown
    pub fn set_escalation_ready(&self, name: &str, ready: bool) -> bool {
        match self.handlers.get(name) {
            Some(entry) => {
                entry.escalation_ready.store(ready, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Resolve `name`, falling back to general when unknown
    pub fn resolve(&self, name: &str) -> Arc<dyn AgentHandler> {
        self.entry(name).handler.clone()
    }

    /// Run the handler for `name` under the deadline; never fails
    pub async fn invoke(&self, name: &str, query: &str) -> AgentOutput {
        let entry = self.entry(name);
        let agent = entry.handler.name().to_string();

        let outcome = match tokio::time::timeout(self.timeout, entry.handler.handle(query)).await
        {
            Ok(result) => result,
            Err(_) => Err(HandlerError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(mut output) => {
                entry.heartbeat.store(true, Ordering::Relaxed);
                output.confidence = clamp_confidence(output.confidence);
                output
            }
            Err(e) => {
                entry.heartbeat.store(false, Ordering::Relaxed);
                warn!(agent = %agent, error = %e, "Handler failed, returning degraded response");
                AgentOutput::degraded(agent, e.to_string())
            }
        }
    }

    /// Run the general handler under the deadline
    pub async fn invoke_general(&self, query: &str) -> AgentOutput {
        self.invoke(GENERAL_AGENT, query).await
    }

    fn entry(&self, name: &str) -> &Registered {
        match self.handlers.get(name) {
            Some(entry) => entry,
            None => {
                debug!(agent = name, "Unknown agent, using general");
                self.general()
            }
        }
    }

    fn general(&self) -> &Registered {
        // Inserted in `new` and only ever replaced, never removed
        &self.handlers[GENERAL_AGENT]
    }
}
