//! Multi-agent decisions
//!
//! - [`QuorumSenate`]: quorum voting with trust-weighted tie mediation
//! - [`SelfCritiqueArbiter`]: runs the specialized and general routes and
//!   returns the more confident one

pub mod arbitration;
pub mod voting;

pub use arbitration::{CritiqueChoice, CritiqueOutcome, SelfCritiqueArbiter};
pub use voting::{
    default_quorum, mediate, propose_rebalance, weighted_majority, ActionProposal, QuorumSenate,
    SenateVerdict, VoteDecision,
};
