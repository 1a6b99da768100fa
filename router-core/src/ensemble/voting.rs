//! Quorum voting with trust-weighted tie mediation
//!
//! Raw approvals and rejections are counted first. When they differ the
//! motion passes iff approvals reach the quorum. An exact tie in raw count
//! is handed to [`mediate`], which sums each side's trust weight; a tie in
//! weight as well is undecidable and escalates the scene.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::escalation::{EscalationRecord, SharedEscalationEngine};
use crate::state::StoreResult;
use crate::trust::{clamp_trust, SharedTrustRegistry};

/// Weight differences at or below this count as equal
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// Weight used for voters with no stored trust
pub const UNKNOWN_VOTER_WEIGHT: f64 = 1.0;

/// Trust moved toward each side after a vote
pub const REBALANCE_STEP: f64 = 0.05;

/// Outcome of a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDecision {
    Approved,
    Rejected,
    /// Tied in both count and trust weight
    Escalated,
}

impl VoteDecision {
    /// `Some(approved)` when decided, `None` when escalated
    pub fn approved(&self) -> Option<bool> {
        match self {
            VoteDecision::Approved => Some(true),
            VoteDecision::Rejected => Some(false),
            VoteDecision::Escalated => None,
        }
    }
}

impl std::fmt::Display for VoteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteDecision::Approved => write!(f, "approved"),
            VoteDecision::Rejected => write!(f, "rejected"),
            VoteDecision::Escalated => write!(f, "escalated"),
        }
    }
}

/// Majority of `members`: `members / 2 + 1`
pub fn default_quorum(members: usize) -> usize {
    members / 2 + 1
}

/// Trust-weighted comparison of the two sides; `None` when equal
pub fn weighted_majority(
    votes: &BTreeMap<String, bool>,
    trust: &BTreeMap<String, f64>,
) -> Option<bool> {
    let weight = |agent: &String| trust.get(agent).copied().unwrap_or(UNKNOWN_VOTER_WEIGHT);
    let approve: f64 = votes.iter().filter(|(_, v)| **v).map(|(a, _)| weight(a)).sum();
    let reject: f64 = votes.iter().filter(|(_, v)| !**v).map(|(a, _)| weight(a)).sum();

    if (approve - reject).abs() <= WEIGHT_EPSILON {
        None
    } else {
        Some(approve > reject)
    }
}

/// Decide a vote without side effects
pub fn mediate(
    votes: &BTreeMap<String, bool>,
    quorum: usize,
    trust: &BTreeMap<String, f64>,
) -> VoteDecision {
    let approvals = votes.values().filter(|v| **v).count();
    let rejections = votes.len() - approvals;

    if approvals != rejections {
        return if approvals >= quorum {
            VoteDecision::Approved
        } else {
            VoteDecision::Rejected
        };
    }

    match weighted_majority(votes, trust) {
        Some(true) => VoteDecision::Approved,
        Some(false) => VoteDecision::Rejected,
        None => VoteDecision::Escalated,
    }
}

/// Suggested weights after a vote: approvers gain, rejecters lose
pub fn propose_rebalance(
    votes: &BTreeMap<String, bool>,
    trust: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    votes
        .iter()
        .map(|(agent, approve)| {
            let delta = if *approve { REBALANCE_STEP } else { -REBALANCE_STEP };
            let current = trust.get(agent).copied().unwrap_or(0.0);
            (agent.clone(), clamp_trust(current + delta))
        })
        .collect()
}

/// One candidate answer in [`QuorumSenate::vote_on_action`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    pub agent_id: String,
    pub confidence: f64,
    pub response: String,
}

/// Result of [`QuorumSenate::decide`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenateVerdict {
    pub scene_id: String,
    pub decision: VoteDecision,
    pub approvals: usize,
    pub rejections: usize,
    pub quorum: usize,
    /// Present when the vote was escalated
    pub escalation: Option<EscalationRecord>,
}

/// Weighted voting body over a fixed member list
pub struct QuorumSenate {
    members: Vec<String>,
    trust: SharedTrustRegistry,
    escalation: SharedEscalationEngine,
}

impl QuorumSenate {
    pub fn new(
        members: Vec<String>,
        trust: SharedTrustRegistry,
        escalation: SharedEscalationEngine,
    ) -> Self {
        Self {
            members,
            trust,
            escalation,
        }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Decide `votes` for `scene_id`, escalating the scene on an undecidable tie.
    ///
    /// A missing or zero quorum uses [`default_quorum`] over the members.
    pub async fn decide(
        &self,
        scene_id: &str,
        votes: &BTreeMap<String, bool>,
        quorum: Option<usize>,
    ) -> SenateVerdict {
        let quorum = quorum
            .filter(|q| *q > 0)
            .unwrap_or_else(|| default_quorum(self.members.len()));
        let trust = self.trust.snapshot().await;
        let decision = mediate(votes, quorum, &trust);

        let approvals = votes.values().filter(|v| **v).count();
        let rejections = votes.len() - approvals;

        let escalation = if decision == VoteDecision::Escalated {
            let reason = format!(
                "undecidable vote: {} approve, {} reject, equal trust weight",
                approvals, rejections
            );
            Some(self.escalation.escalate_scene(scene_id, &reason).await)
        } else {
            None
        };

        info!(
            scene = scene_id,
            decision = %decision,
            approvals,
            rejections,
            quorum,
            "Senate vote decided"
        );

        SenateVerdict {
            scene_id: scene_id.to_string(),
            decision,
            approvals,
            rejections,
            quorum,
            escalation,
        }
    }

    /// Proposal with the highest `confidence x trust`; ties keep the earlier one
    pub async fn vote_on_action(&self, proposals: &[ActionProposal]) -> Option<ActionProposal> {
        let trust = self.trust.snapshot().await;
        let mut best: Option<(&ActionProposal, f64)> = None;

        for proposal in proposals {
            let weight = trust
                .get(&proposal.agent_id)
                .copied()
                .unwrap_or(UNKNOWN_VOTER_WEIGHT);
            let score = proposal.confidence * weight;
            debug!(agent = %proposal.agent_id, score, "Scored proposal");
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((proposal, score));
            }
        }
        best.map(|(proposal, _)| proposal.clone())
    }

    /// Move each voter's stored trust by one rebalance step toward its vote
    pub async fn rebalance(
        &self,
        votes: &BTreeMap<String, bool>,
    ) -> StoreResult<BTreeMap<String, f64>> {
        let mut updated = BTreeMap::new();
        for (agent, approve) in votes {
            let delta = if *approve { REBALANCE_STEP } else { -REBALANCE_STEP };
            updated.insert(agent.clone(), self.trust.update_weight(agent, delta).await?);
        }
        Ok(updated)
    }
}
