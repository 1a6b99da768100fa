//! Post-hoc result validation with automatic fallback

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::dispatch::{AgentOutput, DispatchTable};
use crate::state::{RoutingDecision, RoutingHistory, GENERAL_AGENT};

use super::schema::ContractRegistry;

/// Outcome of reflecting on one handler result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    /// Result handed back to the caller
    pub output: AgentOutput,
    /// Whether the original result met its contract
    pub success: bool,
    /// Whether the general handler produced `output`
    pub fallback_used: bool,
    /// Whether the routing decision reached history
    pub recorded: bool,
}

/// Checks results against contracts and records every decision
#[derive(Clone)]
pub struct ResultReflector {
    contracts: ContractRegistry,
    history: RoutingHistory,
}

impl ResultReflector {
    pub fn new(contracts: ContractRegistry, history: RoutingHistory) -> Self {
        Self { contracts, history }
    }

    pub fn contracts(&self) -> &ContractRegistry {
        &self.contracts
    }

    pub fn history(&self) -> &RoutingHistory {
        &self.history
    }

    /// Validate `output` from `agent`.
    ///
    /// A contract violation replaces the result with the general handler's
    /// answer from `table`. Exactly one routing decision is appended either
    /// way; a failed append is logged and reported in `recorded`.
    pub async fn reflect(
        &self,
        agent: &str,
        query: &str,
        output: AgentOutput,
        table: &DispatchTable,
    ) -> Reflection {
        let success = match self.contracts.check(agent, &output).await {
            Ok(ok) => ok,
            Err(e) => {
                // Contracts unreadable: trust the result rather than fail the route
                error!(agent, error = %e, "Failed to load result contracts");
                true
            }
        };

        let (output, decision) = if success {
            (output, RoutingDecision::accepted(agent, query))
        } else {
            info!(agent, fallback = GENERAL_AGENT, "Result rejected, using fallback");
            (
                table.invoke_general(query).await,
                RoutingDecision::fell_back(agent, query, GENERAL_AGENT),
            )
        };

        let recorded = match self.history.record(decision).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    agent,
                    error = %e,
                    exhausted = e.is_write_exhausted(),
                    "Failed to record routing decision"
                );
                false
            }
        };

        Reflection {
            output,
            success,
            fallback_used: !success,
            recorded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::schema::AgentSchema;
    use crate::state::{JsonStore, StoreHandle};
    use crate::test_support::FixedHandler;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn reflector(dir: &TempDir) -> ResultReflector {
        ResultReflector::new(
            ContractRegistry::new(JsonStore::new(dir.path().join("schema.json"))),
            RoutingHistory::new(
                StoreHandle::spawn(JsonStore::new(dir.path().join("memory.json"))),
                100,
            ),
        )
    }

    fn table() -> DispatchTable {
        DispatchTable::new(Arc::new(FixedHandler::new(GENERAL_AGENT, 0.6)))
    }

    #[tokio::test]
    async fn test_no_contract_is_trusted() {
        let dir = tempdir().unwrap();
        let reflector = reflector(&dir);
        let output = AgentOutput::new("finance", "Budget: fine", 0.9);

        let r = reflector
            .reflect("finance", "show my budget", output.clone(), &table())
            .await;

        assert!(r.success);
        assert!(!r.fallback_used);
        assert_eq!(r.output, output);

        let trace = reflector.history().entries().await.unwrap();
        assert_eq!(trace.len(), 1);
        assert_eq!(trace[0].escalated_to, None);
    }

    #[tokio::test]
    async fn test_violation_uses_general() {
        let dir = tempdir().unwrap();
        let reflector = reflector(&dir);

        let r = reflector
            .reflect(
                "home_automation",
                "toggle kitchen light",
                AgentOutput::new("home_automation", "toggled", 0.8),
                &table(),
            )
            .await;

        assert!(!r.success);
        assert!(r.fallback_used);
        assert_eq!(r.output.agent, GENERAL_AGENT);

        let memory = reflector.history().memory().await.unwrap();
        assert!(memory.fallback_triggered);
        assert_eq!(memory.last_success, Some(false));
        assert_eq!(memory.escalation_path, vec!["home_automation".to_string()]);
        assert_eq!(
            memory.agent_trace[0].escalated_to.as_deref(),
            Some(GENERAL_AGENT)
        );
    }

    #[tokio::test]
    async fn test_success_value_mismatch_falls_back() {
        let dir = tempdir().unwrap();
        let reflector = reflector(&dir);
        reflector
            .contracts()
            .register(
                "security",
                AgentSchema::requiring(["armed"]).with_success_value(true),
            )
            .await
            .unwrap();

        let output = AgentOutput::new("security", "not armed", 0.85).with_field("armed", false);
        let r = reflector.reflect("security", "arm", output, &table()).await;

        assert!(r.fallback_used);
        assert!(r.recorded);
    }
}
