//! Route coordinator
//!
//! Wires the request path together:
//!
//! ```text
//! query → classify → dispatch (deadline, degrade) → reflect (contract, fallback)
//!       → trust ± and ledger → should_escalate? → escalate "route-<uuid>"
//! ```
//!
//! Every collaborator is injected at construction; nothing here is global.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::RouterConfig;
use crate::dispatch::{AgentOutput, SharedDispatchTable};
use crate::escalation::{EscalationEngine, EscalationRecord, SharedEscalationEngine};
use crate::reflect::{ContractRegistry, ResultReflector};
use crate::state::{JsonStore, RoutingHistory, StoreHandle, StoreResult, GENERAL_AGENT};
use crate::trust::{PredictiveLedger, SharedTrustRegistry, TrustRegistry};

use super::classifier::{Classification, IntentClassifier, MatchTier};

/// Audit action recorded when self-heal reroutes a query
pub const REROUTE_ACTION: &str = "reroute";

/// Trust assumed for an agent the registry has never seen
const UNKNOWN_AGENT_TRUST: f64 = 1.0;

/// What the routing and dual-route endpoints return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    /// Agent whose answer is returned (general after a fallback)
    pub agent: String,
    /// Agent the query was routed to
    pub routed_agent: String,
    pub response: String,
    pub confidence: f64,
    pub success: bool,
    pub fallback_used: bool,
    pub timestamp: DateTime<Utc>,
    pub escalated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_id: Option<Uuid>,
    pub matched_keyword: Option<String>,
    pub tier: MatchTier,
    /// Routed agent's trust after this request
    pub trust: f64,
}

/// Result of [`RouteCoordinator::self_heal`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfHealReport {
    pub failed_agent: String,
    pub rerouted_to: String,
    pub trust: f64,
    pub escalation: EscalationRecord,
    pub message: String,
}

/// Agent data model view: capabilities, trust and liveness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    pub name: String,
    pub capabilities: Vec<String>,
    pub trust: Option<f64>,
    pub predictive_trust: f64,
    pub heartbeat: bool,
    pub escalation_ready: bool,
}

/// Shared reference to the coordinator
pub type SharedRouteCoordinator = Arc<RouteCoordinator>;

pub struct RouteCoordinator {
    config: RouterConfig,
    classifier: IntentClassifier,
    table: SharedDispatchTable,
    reflector: ResultReflector,
    trust: SharedTrustRegistry,
    ledger: Arc<PredictiveLedger>,
    escalation: SharedEscalationEngine,
}

impl RouteCoordinator {
    /// Assemble from ready-made parts
    pub fn new(
        config: RouterConfig,
        classifier: IntentClassifier,
        table: SharedDispatchTable,
        reflector: ResultReflector,
        trust: SharedTrustRegistry,
        escalation: SharedEscalationEngine,
    ) -> Self {
        let ledger = Arc::new(PredictiveLedger::with_window_secs(config.ledger_window_secs));
        Self {
            config,
            classifier,
            table,
            reflector,
            trust,
            ledger,
            escalation,
        }
    }

    /// Open every store named in `config` and seed trust for each registered agent
    pub async fn open(config: RouterConfig, table: SharedDispatchTable) -> StoreResult<Self> {
        let trust = TrustRegistry::from_config(&config).await?.shared();
        for name in table.names() {
            trust.ensure_agent(&name, config.initial_trust).await?;
        }

        let history = RoutingHistory::new(
            StoreHandle::spawn(JsonStore::from_config(&config.history_path, &config)),
            config.history_limit,
        );
        let reflector = ResultReflector::new(ContractRegistry::from_config(&config), history);
        let escalation = EscalationEngine::from_config(&config).shared();

        info!(
            data_dir = %config.data_dir.display(),
            agents = table.names().len(),
            "Route coordinator ready"
        );
        Ok(Self::new(
            config,
            IntentClassifier::new(),
            table,
            reflector,
            trust,
            escalation,
        ))
    }

    /// Create a shared reference to this coordinator
    pub fn shared(self) -> SharedRouteCoordinator {
        Arc::new(self)
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn table(&self) -> &SharedDispatchTable {
        &self.table
    }

    pub fn reflector(&self) -> &ResultReflector {
        &self.reflector
    }

    pub fn history(&self) -> &RoutingHistory {
        self.reflector.history()
    }

    pub fn trust(&self) -> &SharedTrustRegistry {
        &self.trust
    }

    pub fn ledger(&self) -> &Arc<PredictiveLedger> {
        &self.ledger
    }

    pub fn escalation(&self) -> &SharedEscalationEngine {
        &self.escalation
    }

    /// Classify `query` and run the full pipeline
    pub async fn route(&self, query: &str) -> RouteResponse {
        let classification = self.classifier.classify_detailed(query);
        info!(
            agent = %classification.agent,
            keyword = ?classification.matched_keyword,
            tier = %classification.tier,
            "Query classified"
        );
        self.run(query, classification).await
    }

    /// Run the pipeline for a fixed agent, skipping classification
    pub async fn route_to(&self, agent: &str, query: &str) -> RouteResponse {
        let classification = Classification {
            agent: agent.to_string(),
            matched_keyword: None,
            tier: MatchTier::None,
        };
        self.run(query, classification).await
    }

    async fn run(&self, query: &str, classification: Classification) -> RouteResponse {
        let agent = self.table.resolve(&classification.agent).name().to_string();

        let output = self.table.invoke(&agent, query).await;
        let degraded = output.is_degraded();
        let reflection = self.reflector.reflect(&agent, query, output, &self.table).await;

        let healthy = reflection.success && !degraded;
        let trust = if healthy {
            self.ledger.record_success(&agent).await;
            self.adjust_trust(&agent, self.config.trust_reward).await
        } else {
            self.ledger.record_failure(&agent).await;
            self.adjust_trust(&agent, -self.config.trust_penalty).await
        };

        let AgentOutput {
            agent: answered_by,
            response,
            confidence,
            ..
        } = reflection.output;

        let escalation_id = if self.escalation.should_escalate(confidence, trust) {
            let scene = format!("route-{}", Uuid::new_v4());
            let reason = format!(
                "{}: confidence {:.2}, trust {:.2}",
                agent, confidence, trust
            );
            Some(self.escalation.escalate_scene(&scene, &reason).await.id)
        } else {
            None
        };

        RouteResponse {
            agent: answered_by,
            routed_agent: agent,
            response,
            confidence,
            success: reflection.success,
            fallback_used: reflection.fallback_used,
            timestamp: Utc::now(),
            escalated: escalation_id.is_some(),
            escalation_id,
            matched_keyword: classification.matched_keyword,
            tier: classification.tier,
            trust,
        }
    }

    /// Zero the failed agent's trust, pick another route and escalate the query
    pub async fn self_heal(&self, query: &str, failed_agent: &str, error: &str) -> SelfHealReport {
        let trust = self.adjust_trust(failed_agent, -1.0).await;
        self.ledger.record_failure(failed_agent).await;

        let mut rerouted_to = self.classifier.classify(query);
        if rerouted_to == failed_agent {
            rerouted_to = GENERAL_AGENT.to_string();
        }

        let escalation = self
            .escalation
            .escalate_scene(query, &format!("{}:{}", failed_agent, error))
            .await;
        self.escalation
            .record_event(
                REROUTE_ACTION,
                json!({
                    "scene": query,
                    "path": [failed_agent, rerouted_to.as_str()],
                }),
            )
            .await;

        warn!(failed = failed_agent, rerouted_to = %rerouted_to, "Self-heal rerouted query");
        SelfHealReport {
            failed_agent: failed_agent.to_string(),
            message: format!(
                "Rerouted to {} due to failure in {}.",
                rerouted_to, failed_agent
            ),
            rerouted_to,
            trust,
            escalation,
        }
    }

    /// Every persisted resource is reachable
    pub fn healthy(&self) -> bool {
        self.trust.probe()
            && self.history().probe()
            && self.reflector.contracts().probe()
            && self.escalation.probe()
    }

    /// Capabilities, trust and liveness of `agent`; `None` if not registered
    pub async fn agent_report(&self, agent: &str) -> Option<AgentReport> {
        let descriptor = self.table.descriptor(agent)?;
        Some(AgentReport {
            trust: self.trust.weight(agent).await,
            predictive_trust: self.ledger.calculate(agent).await,
            name: descriptor.name,
            capabilities: descriptor.capabilities,
            heartbeat: descriptor.heartbeat,
            escalation_ready: descriptor.escalation_ready,
        })
    }

    async fn adjust_trust(&self, agent: &str, delta: f64) -> f64 {
        match self.trust.update_weight(agent, delta).await {
            Ok(weight) => weight,
            Err(e) => {
                error!(
                    agent,
                    error = %e,
                    exhausted = e.is_write_exhausted(),
                    "Failed to persist trust update"
                );
                self.trust.weight_or(agent, UNKNOWN_AGENT_TRUST).await
            }
        }
    }
}
