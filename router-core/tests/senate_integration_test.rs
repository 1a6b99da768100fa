//! Quorum senate against a real trust registry and escalation engine

use std::collections::BTreeMap;

use router_core::escalation::STATUS_ESCALATED;
use router_core::{
    ActionProposal, EscalationEngine, QuorumSenate, RouterConfig, TrustRegistry, VoteDecision,
};
use tempfile::{tempdir, TempDir};

fn votes(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
    pairs.iter().map(|(a, v)| (a.to_string(), *v)).collect()
}

async fn senate(dir: &TempDir, weights: &[(&str, f64)]) -> QuorumSenate {
    let config = RouterConfig::rooted_at(dir.path());
    let trust = TrustRegistry::from_config(&config).await.unwrap().shared();
    for (agent, weight) in weights {
        trust.set_weight(agent, *weight).await.unwrap();
    }
    let members = weights.iter().map(|(a, _)| a.to_string()).collect();
    QuorumSenate::new(members, trust, EscalationEngine::from_config(&config).shared())
}

#[tokio::test]
async fn split_vote_follows_the_more_trusted_member() {
    let dir = tempdir().unwrap();
    let senate = senate(&dir, &[("a", 0.4), ("b", 0.75)]).await;

    let verdict = senate
        .decide("scene1", &votes(&[("a", true), ("b", false)]), Some(2))
        .await;

    assert_eq!(verdict.decision, VoteDecision::Rejected);
    assert_eq!(verdict.decision.approved(), Some(false));
    assert!(verdict.escalation.is_none());
}

#[tokio::test]
async fn clear_majority_ignores_trust() {
    let dir = tempdir().unwrap();
    let senate = senate(&dir, &[("a", 0.1), ("b", 0.1), ("c", 1.0)]).await;

    let verdict = senate
        .decide(
            "scene2",
            &votes(&[("a", true), ("b", true), ("c", false)]),
            None,
        )
        .await;

    assert_eq!(verdict.quorum, 2);
    assert_eq!(verdict.decision, VoteDecision::Approved);
}

#[tokio::test]
async fn equal_weight_tie_escalates_the_scene() {
    let dir = tempdir().unwrap();
    let senate = senate(&dir, &[("a", 0.6), ("b", 0.6)]).await;
    let engine = EscalationEngine::from_config(&RouterConfig::rooted_at(dir.path()));

    let verdict = senate
        .decide("movie_night", &votes(&[("a", true), ("b", false)]), None)
        .await;

    assert_eq!(verdict.decision, VoteDecision::Escalated);
    assert_eq!(verdict.decision.approved(), None);
    let record = verdict.escalation.unwrap();
    assert_eq!(record.scene_id, "movie_night");
    assert!(record.audit_digest.is_some());

    assert_eq!(
        engine.scenes().status("movie_night").await.unwrap().as_deref(),
        Some(STATUS_ESCALATED)
    );
    assert!(engine.verify_audit());
}

#[tokio::test]
async fn proposal_ranking_weighs_confidence_by_trust() {
    let dir = tempdir().unwrap();
    let senate = senate(&dir, &[("a", 1.0), ("b", 0.5)]).await;

    let best = senate
        .vote_on_action(&[
            ActionProposal {
                agent_id: "a".to_string(),
                confidence: 0.6,
                response: "dim the lights".to_string(),
            },
            ActionProposal {
                agent_id: "b".to_string(),
                confidence: 0.9,
                response: "close the blinds".to_string(),
            },
        ])
        .await
        .unwrap();

    assert_eq!(best.agent_id, "a");
    assert!(senate.vote_on_action(&[]).await.is_none());
}

#[tokio::test]
async fn rebalance_moves_voters_by_one_step() {
    let dir = tempdir().unwrap();
    let senate = senate(&dir, &[("a", 0.5), ("b", 0.98)]).await;

    let updated = senate
        .rebalance(&votes(&[("a", false), ("b", true), ("c", true)]))
        .await
        .unwrap();

    assert!((updated["a"] - 0.45).abs() < 1e-9);
    assert_eq!(updated["b"], 1.0);
    assert!((updated["c"] - 0.05).abs() < 1e-9);
}
