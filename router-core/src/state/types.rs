//! Core types for routing state persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::StoreState;

/// Name of the terminal fallback agent
pub const GENERAL_AGENT: &str = "general";

/// Entries kept in the escalation path before the oldest are dropped
pub const ESCALATION_PATH_LIMIT: usize = 50;

/// One routing outcome in the runtime trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// When the decision was recorded
    pub timestamp: DateTime<Utc>,

    /// Original query text
    pub query: String,

    /// Agent the query was routed to
    pub agent: String,

    /// Whether the agent's result passed its contract
    pub success: bool,

    /// Whether the fallback handler produced the final result
    pub fallback: bool,

    /// Agent that took over after a failed contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalated_to: Option<String>,
}

impl RoutingDecision {
    /// Decision for a result that was accepted as-is
    pub fn accepted(agent: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            query: query.into(),
            agent: agent.into(),
            success: true,
            fallback: false,
            escalated_to: None,
        }
    }

    /// Decision for a result that was replaced by `fallback_agent`
    pub fn fell_back(
        agent: impl Into<String>,
        query: impl Into<String>,
        fallback_agent: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            query: query.into(),
            agent: agent.into(),
            success: false,
            fallback: true,
            escalated_to: Some(fallback_agent.into()),
        }
    }
}

/// Runtime memory document: the routing trace plus the latest outcome flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeMemory {
    /// Bounded, append-only routing trace
    pub agent_trace: Vec<RoutingDecision>,

    /// Outcome of the most recent reflection
    pub last_success: Option<bool>,

    /// Whether the most recent reflection needed the fallback
    pub fallback_triggered: bool,

    /// Agents whose results needed a fallback, oldest first
    pub escalation_path: Vec<String>,
}

impl RuntimeMemory {
    /// Append a decision and trim the trace to `limit` entries
    pub fn record(&mut self, decision: RoutingDecision, limit: usize) {
        self.last_success = Some(decision.success);
        self.fallback_triggered = decision.fallback;
        if decision.fallback {
            self.escalation_path.push(decision.agent.clone());
            if self.escalation_path.len() > ESCALATION_PATH_LIMIT {
                let excess = self.escalation_path.len() - ESCALATION_PATH_LIMIT;
                self.escalation_path.drain(..excess);
            }
        }

        self.agent_trace.push(decision);
        if self.agent_trace.len() > limit {
            let excess = self.agent_trace.len() - limit;
            self.agent_trace.drain(..excess);
        }
    }
}

impl StoreState for RuntimeMemory {
    fn validate(&self) -> Result<(), String> {
        // A failed decision without a recorded fallback breaks the trace contract
        for (index, decision) in self.agent_trace.iter().enumerate() {
            if !decision.success && (!decision.fallback || decision.escalated_to.is_none()) {
                return Err(format!(
                    "trace entry {} for '{}' failed without a fallback",
                    index, decision.agent
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_trims_to_limit() {
        let mut memory = RuntimeMemory::default();
        for i in 0..7 {
            memory.record(RoutingDecision::accepted("finance", format!("q{}", i)), 5);
        }

        assert_eq!(memory.agent_trace.len(), 5);
        assert_eq!(memory.agent_trace[0].query, "q2");
        assert_eq!(memory.last_success, Some(true));
    }

    #[test]
    fn test_record_fallback_updates_flags() {
        let mut memory = RuntimeMemory::default();
        memory.record(
            RoutingDecision::fell_back("home_automation", "toggle", GENERAL_AGENT),
            10,
        );

        assert!(memory.fallback_triggered);
        assert_eq!(memory.last_success, Some(false));
        assert_eq!(memory.escalation_path, vec!["home_automation".to_string()]);
    }

    #[test]
    fn test_validate_rejects_failure_without_fallback() {
        let mut decision = RoutingDecision::accepted("security", "arm");
        decision.success = false;
        let memory = RuntimeMemory {
            agent_trace: vec![decision],
            ..Default::default()
        };

        assert!(memory.validate().is_err());
    }

    #[test]
    fn test_escalated_to_omitted_when_absent() {
        let json = serde_json::to_value(RoutingDecision::accepted("finance", "budget")).unwrap();
        assert!(json.get("escalated_to").is_none());
    }
}
