//! Self-critique arbitration between the specialized and the general route

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::router::{RouteResponse, SharedRouteCoordinator};
use crate::state::GENERAL_AGENT;

/// Which route won
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CritiqueChoice {
    /// Classified route (route 1)
    Specialized,
    /// General route (route 2)
    General,
}

/// Both routes and the one returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueOutcome {
    pub choice: CritiqueChoice,
    pub specialized: RouteResponse,
    pub general: RouteResponse,
}

impl CritiqueOutcome {
    pub fn chosen(&self) -> &RouteResponse {
        match self.choice {
            CritiqueChoice::Specialized => &self.specialized,
            CritiqueChoice::General => &self.general,
        }
    }

    pub fn into_chosen(self) -> RouteResponse {
        match self.choice {
            CritiqueChoice::Specialized => self.specialized,
            CritiqueChoice::General => self.general,
        }
    }
}

/// Runs both routes and keeps the more confident answer
pub struct SelfCritiqueArbiter {
    coordinator: SharedRouteCoordinator,
}

impl SelfCritiqueArbiter {
    pub fn new(coordinator: SharedRouteCoordinator) -> Self {
        Self { coordinator }
    }

    /// Route 1 is the classified pipeline, route 2 the general handler with
    /// its own reflection. Each appends its own routing decision. Equal
    /// confidence keeps route 1.
    pub async fn route_with_self_critique(&self, query: &str) -> CritiqueOutcome {
        let specialized = self.coordinator.route(query).await;
        let general = self.coordinator.route_to(GENERAL_AGENT, query).await;

        let choice = if general.confidence > specialized.confidence {
            CritiqueChoice::General
        } else {
            CritiqueChoice::Specialized
        };

        info!(
            specialized = %specialized.routed_agent,
            specialized_confidence = specialized.confidence,
            general_confidence = general.confidence,
            choice = ?choice,
            "Self-critique arbitration"
        );

        CritiqueOutcome {
            choice,
            specialized,
            general,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::dispatch::DispatchTable;
    use crate::router::RouteCoordinator;
    use crate::test_support::FixedHandler;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn arbiter(dir: &std::path::Path, general_confidence: f64) -> SelfCritiqueArbiter {
        let table = DispatchTable::new(Arc::new(FixedHandler::new(
            GENERAL_AGENT,
            general_confidence,
        )))
        .register(Arc::new(FixedHandler::new("finance", 0.9)))
        .shared();
        let coordinator = RouteCoordinator::open(RouterConfig::rooted_at(dir), table)
            .await
            .unwrap()
            .shared();
        SelfCritiqueArbiter::new(coordinator)
    }

    #[tokio::test]
    async fn test_specialized_wins_when_more_confident() {
        let dir = tempdir().unwrap();
        let arbiter = arbiter(dir.path(), 0.6).await;

        let outcome = arbiter.route_with_self_critique("show my budget").await;
        assert_eq!(outcome.choice, CritiqueChoice::Specialized);
        assert_eq!(outcome.chosen().agent, "finance");
    }

    #[tokio::test]
    async fn test_tie_favors_specialized() {
        let dir = tempdir().unwrap();
        let arbiter = arbiter(dir.path(), 0.9).await;

        let outcome = arbiter.route_with_self_critique("show my budget").await;
        assert_eq!(outcome.choice, CritiqueChoice::Specialized);
    }

    #[tokio::test]
    async fn test_two_decisions_recorded() {
        let dir = tempdir().unwrap();
        let arbiter = arbiter(dir.path(), 0.95).await;

        let outcome = arbiter.route_with_self_critique("show my budget").await;
        assert_eq!(outcome.choice, CritiqueChoice::General);

        let trace = arbiter.coordinator.history().entries().await.unwrap();
        let agents: Vec<_> = trace.iter().map(|d| d.agent.as_str()).collect();
        assert_eq!(agents, vec!["finance", GENERAL_AGENT]);
    }
}
