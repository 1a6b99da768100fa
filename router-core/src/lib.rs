//! Router Core Library
//!
//! Routes a natural-language query to one of several agent handlers,
//! checks the result, keeps per-agent trust and escalates what it cannot
//! resolve, leaving a hash-chained audit trail behind.
//!
//! # Components
//!
//! - `state`: atomic JSON stores with backups, quarantine and a
//!   single-writer actor per file
//! - `trust`: durable clamped trust weights and a rolling predictive ledger
//! - `router`: keyword classifier and the [`RouteCoordinator`]
//! - `dispatch`: the [`AgentHandler`] seam with deadlines and degraded answers
//! - `reflect`: per-agent result contracts with general fallback
//! - `escalation`: scene status, threshold policy, audit log
//! - `ensemble`: quorum senate and self-critique arbitration
//!
//! # Usage
//!
//! ```ignore
//! use router_core::{DispatchTable, RouteCoordinator, RouterConfig};
//!
//! let table = DispatchTable::new(general).register(finance).shared();
//! let coordinator = RouteCoordinator::open(RouterConfig::rooted_at("./state"), table).await?;
//! let response = coordinator.route("show my budget").await;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod dispatch;
pub mod ensemble;
pub mod escalation;
pub mod reflect;
pub mod router;
pub mod state;
pub mod trust;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ConfigError, ConfigResult, RouterConfig};
pub use dispatch::{
    AgentDescriptor, AgentHandler, AgentOutput, CompletionError, CompletionResult, DispatchTable,
    HandlerError, SharedDispatchTable, TextCompletion,
};
pub use ensemble::{
    ActionProposal, CritiqueChoice, CritiqueOutcome, QuorumSenate, SelfCritiqueArbiter,
    SenateVerdict, VoteDecision,
};
pub use escalation::{AuditLog, EscalationEngine, EscalationRecord, SceneTracker};
pub use reflect::{AgentSchema, ContractRegistry, Reflection, ResultReflector};
pub use router::{
    AgentReport, Classification, IntentClassifier, MatchTier, RouteCoordinator, RouteResponse,
    SelfHealReport, SharedRouteCoordinator,
};
pub use state::{
    JsonStore, RoutingDecision, RoutingHistory, StoreError, StoreHandle, StoreResult, StoreState,
    GENERAL_AGENT,
};
pub use trust::{PredictiveLedger, SharedTrustRegistry, TrustRegistry};
