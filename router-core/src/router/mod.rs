//! Request routing: intent classification and the coordinator that runs
//! a query through dispatch, reflection, trust and escalation.

pub mod classifier;
pub mod coordinator;

pub use classifier::{Classification, IntentClassifier, KeywordTable, MatchTier};
pub use coordinator::{
    AgentReport, RouteCoordinator, RouteResponse, SelfHealReport, SharedRouteCoordinator,
    REROUTE_ACTION,
};
